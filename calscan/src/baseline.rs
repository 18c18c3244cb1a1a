//! Baseline search: place each discriminator just above its noise floor.
//!
//! The search probes from the top of the baseline range and walks each
//! channel down one step per pass until its counter saturates. The counter
//! feedback is noisy, so the loop is bounded rather than tolerance-driven.

use anyhow::Result;
use caltools::asic::AsicsConfigSnapshot;
use caltools::grid::ChannelGrid;
use caltools::{ThresholdKind, COUNT_MAX};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::hw::{read_counters, Hardware};
use crate::timing::Timing;

/// Probe value near the top of the baseline register range
pub const BASELINE_PROBE: u8 = 61;
/// High-count fraction at and above which a channel counts as saturated
pub const SATURATION_FRACTION: f64 = 0.95;
/// Pass bound. Running into it is a logged terminal state, not an error.
pub const MAX_ITERATIONS: u32 = 20;

/// Lower every channel's baseline for `kind` until its counter stays
/// saturated, mutating `snapshot` in place.
///
/// Before the first push, all three threshold DACs are zeroed, the selector
/// is set to `kind`, and `kind`'s baseline register starts at
/// [`BASELINE_PROBE`]. Baselines only ever decrease; registers belonging to
/// the other kinds are untouched.
pub fn search<H: Hardware>(
    hw: &mut H,
    grid: &ChannelGrid,
    kind: ThresholdKind,
    snapshot: &mut AsicsConfigSnapshot,
    timing: &Timing,
) -> Result<()> {
    for cc in snapshot.channels_mut() {
        cc.reset_dacs();
        cc.trigger_mode_2_b = kind.index();
        cc.set_baseline(kind, BASELINE_PROBE);
    }

    let mut iterations = 0;
    while iterations < MAX_ITERATIONS {
        hw.set_asics_config(snapshot)?;
        std::thread::sleep(timing.period());
        std::thread::sleep(timing.settle());

        let mut fraction = HashMap::new();
        for chip in grid.chips().iter().copied() {
            let counts = read_counters(hw, chip)?;
            for (channel, v) in counts.iter().enumerate() {
                fraction.insert(chip.channel(channel as u8), *v as f64 / COUNT_MAX as f64);
            }
        }

        let mut adjusted = false;
        for addr in grid.channels() {
            let cc = snapshot.channel_mut(addr);
            let b = cc.baseline(kind);
            if fraction[&addr] < SATURATION_FRACTION && b > 0 {
                cc.set_baseline(kind, b - 1);
                adjusted = true;
            }
        }

        iterations += 1;
        if !adjusted {
            debug!(
                "baseline for {} settled after {} passes",
                kind.dac_name(),
                iterations
            );
            return Ok(());
        }
    }

    warn!(
        "baseline for {} still adjusting after {} passes; keeping last state",
        kind.dac_name(),
        MAX_ITERATIONS
    );
    Ok(())
}

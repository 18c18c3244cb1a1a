//! Threshold sweeps: counter response as a function of DAC value.
//!
//! The noise and dark-count scans share one sweep shape and differ only in
//! how a raw count is normalized. Reads are paced by deadline, not fixed
//! sleeps, so a sharing window wider than the sample interval cannot starve
//! a sample.

use anyhow::Result;
use caltools::asic::AsicsConfigSnapshot;
use caltools::grid::ChannelGrid;
use caltools::{ser, ThresholdKind, COUNT_MAX, DAC_MAX};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Instant;

use crate::hw::{read_counters, Hardware};
use crate::timing::{self, Timing};

/// What a sweep measures, fixing the normalization of raw counts
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Scan {
    /// Fraction of the counter's full scale, in [0, 1]
    Noise,
    /// Counts per second of integration time
    Dark,
}

impl Scan {
    fn normalize(self, raw: u32, timing: &Timing) -> f64 {
        match self {
            Scan::Noise => raw as f64 / COUNT_MAX as f64,
            Scan::Dark => raw as f64 / timing.period_secs(),
        }
    }
}

/// Sweep `kind`'s DAC over the full range in ascending order, taking exactly
/// `samples` paced counter reads per value. Every read appends one row per
/// channel to `wtr`; none are dropped.
pub fn scan<H: Hardware, W: Write>(
    hw: &mut H,
    grid: &ChannelGrid,
    kind: ThresholdKind,
    snapshot: &mut AsicsConfigSnapshot,
    timing: &Timing,
    what: Scan,
    samples: usize,
    wtr: &mut csv::Writer<W>,
) -> Result<()> {
    let bar = ProgressBar::new(DAC_MAX as u64 + 1).with_style(
        ProgressStyle::default_bar().template("{msg:>6} {bar:40} {pos}/{len}"),
    );
    bar.set_message(kind.dac_name());

    for value in 0..=DAC_MAX {
        for cc in snapshot.channels_mut() {
            cc.reset_dacs();
            cc.trigger_mode_2_b = kind.index();
            cc.set_dac(kind, value);
        }
        hw.set_asics_config(snapshot)?;
        std::thread::sleep(timing.period());

        let mut next_read = timing.next_deadline(Instant::now());
        for _ in 0..samples {
            timing::sleep_until(next_read);
            next_read = timing.next_deadline(Instant::now());
            for chip in grid.chips().iter().copied() {
                let counts = read_counters(hw, chip)?;
                for (channel, raw) in counts.iter().enumerate() {
                    ser::scan(
                        wtr,
                        &ser::ScanRecord {
                            addr: chip.channel(channel as u8),
                            threshold: kind.dac_name(),
                            value,
                            count: what.normalize(*raw, timing),
                        },
                    )?;
                }
            }
        }
        bar.inc(1);
    }
    bar.finish();
    Ok(())
}

//! Calibration orchestration: preconditions, phase sequencing, bias-rail
//! transitions and guaranteed cleanup.

use anyhow::{bail, Result};
use caltools::asic::AsicsConfigSnapshot;
use caltools::cfg::SystemConfig;
use caltools::grid::ChannelGrid;
use caltools::{ser, ThresholdKind};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;
use tracing::{info, warn};

use crate::baseline;
use crate::hw::{BiasLevel, Hardware};
use crate::sweep::{self, Scan};
use crate::timing::{self, Timing};

/// Counter mode during baseline search and the noise sweep
const COUNTER_MODE_NOISE: u8 = 0xF;
/// Counter mode during the dark-count sweep
const COUNTER_MODE_DARK: u8 = 0xC;
/// Post-trigger holdoff applied only while counting dark pulses
const DARK_DEAD_TIME: u8 = 20;
/// Counter period register value per chip subtype
const COUNTER_PERIOD_2B: u8 = 0x4;
const COUNTER_PERIOD_DEFAULT: u8 = 0b110;

/// Which phases to run
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Mode {
    All,
    BaselineNoise,
    Dark,
}

impl argh::FromArgValue for Mode {
    fn from_arg_value(value: &str) -> Result<Self, String> {
        match value {
            "all" => Ok(Mode::All),
            "baseline_noise" => Ok(Mode::BaselineNoise),
            "dark" => Ok(Mode::Dark),
            _ => Err(format!(
                "unknown mode {:?}, expected all, baseline_noise or dark",
                value
            )),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::All => "all",
            Mode::BaselineNoise => "baseline_noise",
            Mode::Dark => "dark",
        };
        write!(f, "{}", s)
    }
}

/// Operator acknowledgement seam. The orchestrator blocks on it wherever an
/// externally-set bias level must be in place before the next phase.
pub trait Prompt {
    fn ack(&mut self, message: &str) -> Result<()>;
}

/// Blocks on one line from stdin
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn ack(&mut self, message: &str) -> Result<()> {
        print!("{} and press ENTER", message);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(())
    }
}

/// Run parameters from the command line
#[derive(Clone, Debug)]
pub struct ScanOpts {
    pub mode: Mode,
    pub noise_reads: usize,
    pub dark_reads: usize,
    pub ext_bias: bool,
    pub out_prefix: String,
}

/// Owns the adapter for the duration of a run. Whatever path leaves the run
/// (completion, an error anywhere in a phase, a panic), bias is driven off
/// and the acquisition released on drop, independently of one another.
/// Failures there are warnings: any results are already on disk.
struct Daq<H: Hardware> {
    hw: H,
}

impl<H: Hardware> Daq<H> {
    fn hw(&mut self) -> &mut H {
        &mut self.hw
    }
}

impl<H: Hardware> Drop for Daq<H> {
    fn drop(&mut self) {
        if let Err(e) = self.hw.set_bias(BiasLevel::Off) {
            warn!("could not power bias off: {:#}", e);
        }
        if let Err(e) = self.hw.close_acquisition() {
            warn!("could not release acquisition: {:#}", e);
        }
    }
}

/// Run the calibration. Returns the number of calibrated chips.
pub fn calibrate<H: Hardware, P: Prompt>(
    hw: H,
    prompt: &mut P,
    config: &SystemConfig,
    opts: &ScanOpts,
) -> Result<usize> {
    let mut daq = Daq { hw };
    run_phases(daq.hw(), prompt, config, opts)
}

fn run_phases<H: Hardware>(
    hw: &mut H,
    prompt: &mut impl Prompt,
    config: &SystemConfig,
    opts: &ScanOpts,
) -> Result<usize> {
    // A board with its power rail down is corrected, not fatal
    for (port, slave) in hw.active_febds()? {
        if !hw.fem_power_status(port, slave)? {
            warn!(
                "FEM power for (portID, slaveID) = ({}, {}) is off; powering on",
                port, slave
            );
            hw.set_fem_power(port, slave, true)?;
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    // No sensors means no working front end; stop before touching anything
    if hw.sensor_list()?.is_empty() {
        bail!("no temperature sensors found; check connections and power");
    }

    hw.initialize_system()?;
    hw.open_acquisition()?;

    if opts.ext_bias && opts.mode == Mode::All {
        prompt.ack("Set no-dark bias voltage")?;
    }

    let start_bias = if opts.mode == Mode::Dark || opts.ext_bias {
        BiasLevel::Off
    } else {
        BiasLevel::PreBreakdown
    };
    hw.set_bias(start_bias)?;

    let grid = ChannelGrid::new(hw.active_asics()?);
    let mut snapshot = hw.get_asics_config()?;

    let clock = hw.system_frequency()?;
    let mut subtypes = Vec::new();
    for chip in grid.chips() {
        subtypes.push(hw.asic_subtype(*chip)?);
    }
    let sharing = timing::counter_sharing(&subtypes);
    let timing = Timing::new(clock, sharing);

    for (chip, subtype) in grid.chips().iter().zip(&subtypes) {
        let gc = snapshot.global_mut(*chip);
        gc.counter_en = 0b1;
        gc.counter_period = if subtype == "2B" {
            COUNTER_PERIOD_2B
        } else {
            COUNTER_PERIOD_DEFAULT
        };
    }
    for cc in snapshot.channels_mut() {
        cc.trigger_mode_1 = 0;
        cc.counter_mode = COUNTER_MODE_NOISE;
        cc.trigger_b_latched = 0;
    }

    // The dark-only mode still measures baselines and noise (bias stays
    // off), but keeps the results out of the way of a previous full run
    let (baseline_name, noise_name) = match opts.mode {
        Mode::Dark => (
            format!("{}_baseline_tmp.tsv", opts.out_prefix),
            format!("{}_noise_tmp.tsv", opts.out_prefix),
        ),
        _ => (
            format!("{}_baseline.tsv", opts.out_prefix),
            format!("{}_noise.tsv", opts.out_prefix),
        ),
    };

    info!("adjusting baselines");
    for kind in ThresholdKind::ALL {
        baseline::search(hw, &grid, kind, &mut snapshot, &timing)?;
    }
    write_baseline_table(&baseline_name, &grid, &snapshot)?;

    info!("scanning thresholds for noise");
    {
        let f = File::create(&noise_name)?;
        let mut wtr = ser::writer(BufWriter::new(f));
        for kind in ThresholdKind::ALL {
            sweep::scan(
                hw,
                &grid,
                kind,
                &mut snapshot,
                &timing,
                Scan::Noise,
                opts.noise_reads,
                &mut wtr,
            )?;
        }
        wtr.flush()?;
    }

    if opts.mode != Mode::BaselineNoise {
        for cc in snapshot.channels_mut() {
            cc.trigger_mode_1 = 0;
            cc.counter_mode = COUNTER_MODE_DARK;
            cc.trigger_b_latched = 0;
            cc.dead_time = DARK_DEAD_TIME;
        }

        if opts.ext_bias {
            prompt.ack("Set normal operation bias voltage")?;
        } else {
            hw.set_bias(BiasLevel::On)?;
            std::thread::sleep(config.bias_settling);
        }

        info!("scanning thresholds for dark counts");
        let f = File::create(format!("{}_dark.tsv", opts.out_prefix))?;
        let mut wtr = ser::writer(BufWriter::new(f));
        for kind in ThresholdKind::ALL {
            sweep::scan(
                hw,
                &grid,
                kind,
                &mut snapshot,
                &timing,
                Scan::Dark,
                opts.dark_reads,
                &mut wtr,
            )?;
        }
        wtr.flush()?;
    }

    Ok(grid.chips().len())
}

/// One row per channel, channel-major:
/// `portID slaveID chipID channelID baseline_t baseline_e`
fn write_baseline_table(
    path: &str,
    grid: &ChannelGrid,
    snapshot: &AsicsConfigSnapshot,
) -> Result<()> {
    let f = File::create(path)?;
    let mut wtr = ser::writer(BufWriter::new(f));
    for addr in grid.channels() {
        let cc = snapshot.channel(addr);
        ser::baseline(
            &mut wtr,
            &ser::BaselineRecord {
                addr,
                baseline_t: cc.baseline_t,
                baseline_e: cc.baseline_e,
            },
        )?;
    }
    wtr.flush()?;
    Ok(())
}

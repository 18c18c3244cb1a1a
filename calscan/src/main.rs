use anyhow::{bail, Result};
use calscan::run::{self, ConsolePrompt};
use calscan::{daqd, sim, CliArgs};
use caltools::cfg;
use chrono::Local;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;
use tracing::error;

const GIT_VERSION: &str = git_version::git_version!(fallback = "1.2.0");

fn main() {
    // Parse command line arguments
    let args: CliArgs = argh::from_env();

    if args.version {
        println!(
            concat!(
                env!("CARGO_BIN_NAME"),
                " ",
                "{}",
            ),
            GIT_VERSION,
        );
        return;
    }

    tracing_subscriber::fmt::init();

    match acquire(&args) {
        Ok(()) => println!("calscan: done"),
        Err(e) => {
            error!("calibration failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn acquire(args: &CliArgs) -> Result<()> {
    let cfg_path = match &args.config {
        Some(c) => Path::new(c),
        None => bail!("no system configuration provided"),
    };
    let prefix = match &args.output {
        Some(o) => o.clone(),
        None => bail!("no output prefix provided"),
    };
    let config = cfg::load(cfg_path)?;

    let opts = run::ScanOpts {
        mode: args.mode,
        noise_reads: args.nreads_noise,
        dark_reads: args.nreads_dark,
        ext_bias: args.ext_bias,
        out_prefix: prefix.clone(),
    };

    let timestamp = Local::now();
    let t0 = Instant::now();
    let chips = if args.sim {
        run::calibrate(sim::SimHardware::new(2), &mut ConsolePrompt, &config, &opts)?
    } else {
        let hw = daqd::Daqd::connect(Path::new(&args.daqd), &config, args.ext_bias)?;
        run::calibrate(hw, &mut ConsolePrompt, &config, &opts)?
    };

    // Record the run beside its tables
    let record = cfg::RunRecord {
        description: config.description.clone(),
        timestamp: Some(timestamp),
        mode: args.mode.to_string(),
        noise_reads: args.nreads_noise,
        dark_reads: args.nreads_dark,
        ext_bias: args.ext_bias,
        chips,
        elapsed: t0.elapsed(),
    };
    let f = File::create(format!("{}_run.json", prefix))?;
    serde_json::to_writer_pretty(BufWriter::new(f), &record)?;

    Ok(())
}

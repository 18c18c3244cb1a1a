//! Full calibration runs against the software front end

use anyhow::Result;
use calscan::run::{calibrate, Mode, Prompt, ScanOpts};
use calscan::sim::SimHardware;
use caltools::cfg::SystemConfig;
use caltools::CHANNELS_PER_ASIC;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

struct AutoAck;

impl Prompt for AutoAck {
    fn ack(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn out_prefix(tag: &str) -> String {
    let mut p = PathBuf::from(std::env::temp_dir());
    p.push(format!("calscan-it-{}-{}", tag, std::process::id()));
    p.to_string_lossy().to_string()
}

fn fast_config() -> SystemConfig {
    SystemConfig {
        bias_settling: Duration::from_millis(0),
        ..Default::default()
    }
}

fn read_rows(path: &str) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap_or_else(|_| panic!("missing table {}", path))
        .lines()
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect()
}

#[test]
fn full_run_writes_complete_tables() {
    let n_chips = 2usize;
    let floor = 50u8;
    let mut hw = SimHardware::new(n_chips as u16);
    hw.set_uniform_floor(floor);

    let prefix = out_prefix("all");
    let opts = ScanOpts {
        mode: Mode::All,
        noise_reads: 2,
        dark_reads: 1,
        ext_bias: false,
        out_prefix: prefix.clone(),
    };
    let chips = calibrate(hw, &mut AutoAck, &fast_config(), &opts).unwrap();
    assert_eq!(n_chips, chips);

    let channels = n_chips * CHANNELS_PER_ASIC;

    let baseline = read_rows(&format!("{}_baseline.tsv", prefix));
    assert_eq!(channels, baseline.len());
    for row in &baseline {
        assert_eq!(6, row.len());
        let b_t: u8 = row[4].parse().unwrap();
        let b_e: u8 = row[5].parse().unwrap();
        assert_eq!(floor, b_t);
        assert_eq!(floor, b_e);
    }
    // channel-major ordering: both chips at channel 0 come first
    assert_eq!("0", baseline[0][2]);
    assert_eq!("0", baseline[0][3]);
    assert_eq!("1", baseline[1][2]);
    assert_eq!("0", baseline[1][3]);

    let noise = read_rows(&format!("{}_noise.tsv", prefix));
    assert_eq!(3 * 64 * opts.noise_reads * channels, noise.len());
    for row in &noise {
        assert_eq!(7, row.len());
        let fraction: f64 = row[6].parse().unwrap();
        assert!((0.0..=1.0).contains(&fraction));
    }
    // every kind appears, in calibration order
    assert_eq!("vth_t1", noise[0][4]);
    assert_eq!("vth_e", noise.last().unwrap()[4]);

    let dark = read_rows(&format!("{}_dark.tsv", prefix));
    assert_eq!(3 * 64 * opts.dark_reads * channels, dark.len());
    for row in &dark {
        let rate: f64 = row[6].parse().unwrap();
        assert!(rate >= 0.0);
    }
}

#[test]
fn dark_mode_keeps_noise_tables_out_of_the_way() {
    let mut hw = SimHardware::new(1);
    hw.set_uniform_floor(61);

    let prefix = out_prefix("dark");
    let opts = ScanOpts {
        mode: Mode::Dark,
        noise_reads: 1,
        dark_reads: 1,
        ext_bias: false,
        out_prefix: prefix.clone(),
    };
    calibrate(hw, &mut AutoAck, &fast_config(), &opts).unwrap();

    assert!(fs::metadata(format!("{}_baseline_tmp.tsv", prefix)).is_ok());
    assert!(fs::metadata(format!("{}_noise_tmp.tsv", prefix)).is_ok());
    assert!(fs::metadata(format!("{}_dark.tsv", prefix)).is_ok());
    assert!(fs::metadata(format!("{}_baseline.tsv", prefix)).is_err());

    let dark = read_rows(&format!("{}_dark.tsv", prefix));
    assert_eq!(3 * 64 * CHANNELS_PER_ASIC, dark.len());
    // internal bias went straight to the dark-ready level, so the model
    // produced real counts at low thresholds
    assert!(dark.iter().any(|row| row[6].parse::<f64>().unwrap() > 0.0));
}

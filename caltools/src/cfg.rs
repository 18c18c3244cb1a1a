//! Configuration tools: the system description consumed at adapter setup,
//! and the record written beside a run's output tables.

use anyhow::{Context, Result};
use chrono::{offset::Local, DateTime};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System description, declared in a JSON file.
///
/// The calibration table paths are consumed by the hardware adapter when it
/// brings the system up; with externally controlled bias they are left
/// unloaded. `bias_settling` is parsed as in
/// [humantime](https://docs.rs/humantime/), e.g. `2s` or `1500ms`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct SystemConfig {
    #[serde(default)]
    pub description: String,
    pub bias_calibration: Option<PathBuf>,
    pub bias_settings: Option<PathBuf>,
    #[serde(with = "humantime_serde", default = "default_settling")]
    pub bias_settling: Duration,
}

fn default_settling() -> Duration {
    Duration::from_secs(2)
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            description: String::new(),
            bias_calibration: None,
            bias_settings: None,
            bias_settling: default_settling(),
        }
    }
}

/// Read a [`SystemConfig`] from a JSON file
pub fn load(path: &Path) -> Result<SystemConfig> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let rdr = BufReader::new(f);
    let config = serde_json::from_reader(rdr)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Record of one calibration run
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RunRecord {
    pub description: String,
    pub timestamp: Option<DateTime<Local>>,
    pub mode: String,
    pub noise_reads: usize,
    pub dark_reads: usize,
    pub ext_bias: bool,
    pub chips: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

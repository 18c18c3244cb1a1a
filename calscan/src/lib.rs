pub mod baseline;
pub mod daqd;
pub mod hw;
pub mod run;
pub mod sim;
pub mod sweep;
pub mod timing;

use argh::FromArgs;

#[derive(Debug, FromArgs, Clone)]
/// Acquire data for discriminator threshold calibration
pub struct CliArgs {
    /// print version information
    #[argh(switch, short = 'v')]
    pub version: bool,
    /// system configuration file path
    #[argh(option)]
    pub config: Option<String>,
    /// output file prefix
    #[argh(option, short = 'o')]
    pub output: Option<String>,
    /// phases to run: all, baseline_noise or dark
    #[argh(option, default = "run::Mode::All")]
    pub mode: run::Mode,
    /// counter reads per threshold step in the noise scan
    #[argh(option, default = "4")]
    pub nreads_noise: usize,
    /// counter reads per threshold step in the dark scan
    #[argh(option, default = "4")]
    pub nreads_dark: usize,
    /// bias voltage is set externally; pause for the operator between phases
    #[argh(switch)]
    pub ext_bias: bool,
    /// run against the software front-end simulator
    #[argh(switch)]
    pub sim: bool,
    /// daqd control socket path
    #[argh(option, default = "String::from(\"/tmp/d.sock\")")]
    pub daqd: String,
}

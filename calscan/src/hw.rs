//! The narrow seam to the data acquisition hardware.
//!
//! Everything the calibration needs from the system goes through
//! [`Hardware`]: configuration pushes, counter-bank reads, bias rail
//! control and the acquisition resource. [`crate::daqd`] implements it
//! against the DAQ driver socket, [`crate::sim`] against a software model.

use anyhow::Result;
use caltools::asic::AsicsConfigSnapshot;
use caltools::{ChipAddress, CHANNELS_PER_ASIC};

/// Bias rail levels understood by the power chain
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum BiasLevel {
    Off,
    PreBreakdown,
    On,
}

/// Memory-controller bank holding the per-channel noise counters
pub const COUNTER_BANK: u8 = 5;
/// Counter word width in bits
pub const COUNTER_WIDTH: u8 = 24;

/// Channels one ASIC TX link can service at the GbE line rate:
/// min(64 channels, 126/16 event slots per frame, 1024/80 TX budget) = 7.
pub const TX_LIMITED_CHANNELS: usize = 7;
/// Channels driven at once. The conservative override of the TX-derived
/// limit, kept until the larger value is revalidated on hardware.
pub const SIMULTANEOUS_CHANNELS: usize = 1;

pub trait Hardware {
    fn initialize_system(&mut self) -> Result<()>;
    fn active_asics(&mut self) -> Result<Vec<ChipAddress>>;
    fn active_febds(&mut self) -> Result<Vec<(u16, u16)>>;
    fn asic_subtype(&mut self, chip: ChipAddress) -> Result<String>;
    /// System clock frequency in Hz
    fn system_frequency(&mut self) -> Result<f64>;
    fn get_asics_config(&mut self) -> Result<AsicsConfigSnapshot>;
    /// Push the full snapshot. The hardware applies all of it before any
    /// subsequent read reflects it.
    fn set_asics_config(&mut self, snapshot: &AsicsConfigSnapshot) -> Result<()>;
    fn read_mem_ctrl(
        &mut self,
        port: u16,
        slave: u16,
        bank: u8,
        width: u8,
        offset: u32,
        count: u32,
    ) -> Result<Vec<u32>>;
    fn set_bias(&mut self, level: BiasLevel) -> Result<()>;
    fn fem_power_status(&mut self, port: u16, slave: u16) -> Result<bool>;
    fn set_fem_power(&mut self, port: u16, slave: u16, on: bool) -> Result<()>;
    /// Discoverable temperature sensors; an empty list means the front end
    /// is unpowered or disconnected
    fn sensor_list(&mut self) -> Result<Vec<String>>;
    fn open_acquisition(&mut self) -> Result<()>;
    fn close_acquisition(&mut self) -> Result<()>;
}

/// Read the 64-channel counter bank of one chip
pub fn read_counters<H: Hardware + ?Sized>(hw: &mut H, chip: ChipAddress) -> Result<Vec<u32>> {
    hw.read_mem_ctrl(
        chip.port,
        chip.slave,
        COUNTER_BANK,
        COUNTER_WIDTH,
        CHANNELS_PER_ASIC as u32 * chip.chip as u32,
        CHANNELS_PER_ASIC as u32,
    )
}

//! Software model of the front end.
//!
//! Stands in for a powered bench: every channel has a noise floor in
//! baseline units and a noise edge in DAC units, and produces dark counts
//! under full bias. Counter reads honor only the last pushed snapshot, so a
//! missing push, a disabled counter or a stale selector shows up as wrong
//! counts, the same way it would on hardware. Selected with `--sim`; the
//! test suite drives the calibration against it.

use anyhow::{bail, Result};
use caltools::asic::AsicsConfigSnapshot;
use caltools::{ChipAddress, ThresholdKind, CHANNELS_PER_ASIC, COUNT_MAX};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::hw::{BiasLevel, Hardware, COUNTER_BANK, COUNTER_WIDTH};

/// Simulated system clock; makes the integration period exactly 1 ms
pub const SIM_CLOCK_HZ: f64 = COUNT_MAX as f64 * 1000.0;

/// Adapter activity, shared with whoever holds the stats handle
#[derive(Default, Debug)]
pub struct Stats {
    pub initializations: usize,
    pub pushes: usize,
    pub counter_reads: usize,
    pub bias_off: usize,
    pub bias_prebd: usize,
    pub bias_on: usize,
    pub acquisitions_opened: usize,
    pub acquisitions_closed: usize,
}

pub struct SimHardware {
    chips: Vec<ChipAddress>,
    subtype: String,
    floors: Vec<u8>,
    knees: Vec<u8>,
    dark_scale: u32,
    pushed: Option<AsicsConfigSnapshot>,
    bias: BiasLevel,
    fem_power: HashMap<(u16, u16), bool>,
    sensors: Vec<String>,
    acquisition_open: bool,
    fail_after_pushes: Option<usize>,
    stats: Arc<Mutex<Stats>>,
}

impl SimHardware {
    /// `n_chips` chips on port 0, slave 0, with a deterministic spread of
    /// noise floors and edges
    pub fn new(n_chips: u16) -> Self {
        let chips: Vec<ChipAddress> = (0..n_chips)
            .map(|chip| ChipAddress { port: 0, slave: 0, chip })
            .collect();
        let n = chips.len() * CHANNELS_PER_ASIC;
        SimHardware {
            subtype: String::from("2C"),
            floors: (0..n).map(|i| 44 + (i % 8) as u8).collect(),
            knees: (0..n).map(|i| 18 + (i % 6) as u8).collect(),
            dark_scale: 50_000,
            pushed: None,
            bias: BiasLevel::Off,
            fem_power: chips.iter().map(|c| ((c.port, c.slave), true)).collect(),
            sensors: vec![String::from("febd_0_0/tmp104_0")],
            acquisition_open: false,
            fail_after_pushes: None,
            stats: Arc::new(Mutex::new(Stats::default())),
            chips,
        }
    }

    pub fn stats(&self) -> Arc<Mutex<Stats>> {
        self.stats.clone()
    }

    /// Noise floor of the i-th channel, chip-major
    pub fn floor(&self, i: usize) -> u8 {
        self.floors[i]
    }

    /// Same noise floor on every channel
    pub fn set_uniform_floor(&mut self, floor: u8) {
        for f in &mut self.floors {
            *f = floor;
        }
    }

    /// Fail every configuration push after the first `n`, as a dropped
    /// link would
    pub fn fail_after_pushes(&mut self, n: usize) {
        self.fail_after_pushes = Some(n);
    }

    pub fn clear_sensors(&mut self) {
        self.sensors.clear();
    }

    pub fn set_fem_power_state(&mut self, port: u16, slave: u16, on: bool) {
        self.fem_power.insert((port, slave), on);
    }

    pub fn set_subtype(&mut self, subtype: &str) {
        self.subtype = subtype.to_string();
    }

    fn count(&self, chip_pos: usize, channel: usize) -> u32 {
        let snapshot = match &self.pushed {
            Some(s) => s,
            None => return 0,
        };
        let chip = self.chips[chip_pos];
        if snapshot.global(chip).counter_en == 0 {
            return 0;
        }
        let cc = snapshot.channel(chip.channel(channel as u8));
        let kind = match cc.trigger_mode_2_b {
            0 => ThresholdKind::T1,
            1 => ThresholdKind::T2,
            _ => ThresholdKind::E,
        };
        let vth = cc.dac(kind);
        let b = cc.baseline(kind);
        let i = chip_pos * CHANNELS_PER_ASIC + channel;
        match cc.counter_mode {
            0xC => {
                // dark counts need full bias, fall off with threshold and
                // are quenched by dead time
                if self.bias != BiasLevel::On {
                    return 0;
                }
                let c = self.dark_scale * (64 - vth as u32) / 64;
                c / (1 + cc.dead_time as u32 / 20)
            }
            _ => {
                if b <= self.floors[i] && vth <= self.knees[i] {
                    COUNT_MAX
                } else {
                    COUNT_MAX >> 6
                }
            }
        }
    }
}

impl Hardware for SimHardware {
    fn initialize_system(&mut self) -> Result<()> {
        self.stats.lock().initializations += 1;
        Ok(())
    }

    fn active_asics(&mut self) -> Result<Vec<ChipAddress>> {
        Ok(self.chips.clone())
    }

    fn active_febds(&mut self) -> Result<Vec<(u16, u16)>> {
        let mut febds = Vec::new();
        for chip in &self.chips {
            if !febds.contains(&(chip.port, chip.slave)) {
                febds.push((chip.port, chip.slave));
            }
        }
        Ok(febds)
    }

    fn asic_subtype(&mut self, _chip: ChipAddress) -> Result<String> {
        Ok(self.subtype.clone())
    }

    fn system_frequency(&mut self) -> Result<f64> {
        Ok(SIM_CLOCK_HZ)
    }

    fn get_asics_config(&mut self) -> Result<AsicsConfigSnapshot> {
        match &self.pushed {
            Some(s) => Ok(s.clone()),
            None => Ok(AsicsConfigSnapshot::new(&self.chips)),
        }
    }

    fn set_asics_config(&mut self, snapshot: &AsicsConfigSnapshot) -> Result<()> {
        let pushes = {
            let mut stats = self.stats.lock();
            stats.pushes += 1;
            stats.pushes
        };
        if let Some(n) = self.fail_after_pushes {
            if pushes > n {
                bail!("link to FEB/D lost");
            }
        }
        self.pushed = Some(snapshot.clone());
        Ok(())
    }

    fn read_mem_ctrl(
        &mut self,
        port: u16,
        slave: u16,
        bank: u8,
        width: u8,
        offset: u32,
        count: u32,
    ) -> Result<Vec<u32>> {
        if bank != COUNTER_BANK || width != COUNTER_WIDTH {
            bail!("unmapped mem_ctrl read: bank {} width {}", bank, width);
        }
        if count != CHANNELS_PER_ASIC as u32 {
            bail!("counter reads cover one full bank of {} channels", CHANNELS_PER_ASIC);
        }
        let chip_pos = self
            .chips
            .iter()
            .position(|c| {
                c.port == port
                    && c.slave == slave
                    && CHANNELS_PER_ASIC as u32 * c.chip as u32 == offset
            })
            .ok_or_else(|| {
                anyhow::anyhow!("no chip at ({}, {}) offset {}", port, slave, offset)
            })?;
        self.stats.lock().counter_reads += 1;
        Ok((0..CHANNELS_PER_ASIC).map(|ch| self.count(chip_pos, ch)).collect())
    }

    fn set_bias(&mut self, level: BiasLevel) -> Result<()> {
        {
            let mut stats = self.stats.lock();
            match level {
                BiasLevel::Off => stats.bias_off += 1,
                BiasLevel::PreBreakdown => stats.bias_prebd += 1,
                BiasLevel::On => stats.bias_on += 1,
            }
        }
        self.bias = level;
        Ok(())
    }

    fn fem_power_status(&mut self, port: u16, slave: u16) -> Result<bool> {
        Ok(*self.fem_power.get(&(port, slave)).unwrap_or(&false))
    }

    fn set_fem_power(&mut self, port: u16, slave: u16, on: bool) -> Result<()> {
        self.fem_power.insert((port, slave), on);
        Ok(())
    }

    fn sensor_list(&mut self) -> Result<Vec<String>> {
        Ok(self.sensors.clone())
    }

    fn open_acquisition(&mut self) -> Result<()> {
        if self.acquisition_open {
            bail!("acquisition already open");
        }
        self.acquisition_open = true;
        self.stats.lock().acquisitions_opened += 1;
        Ok(())
    }

    fn close_acquisition(&mut self) -> Result<()> {
        if !self.acquisition_open {
            bail!("acquisition not open");
        }
        self.acquisition_open = false;
        self.stats.lock().acquisitions_closed += 1;
        Ok(())
    }
}

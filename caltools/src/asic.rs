//! Register-level model of the front-end ASIC configuration
//!
//! The whole snapshot is the unit of exchange with the hardware: mutations
//! take observable effect only after a full push, never incrementally. The
//! per-channel configs live in one flat arena, 64 consecutive slots per chip
//! in chip-table order, so a sweep mutates in place instead of deep-copying a
//! nested structure per step.

use crate::{ChannelAddress, ChipAddress, ThresholdKind, CHANNELS_PER_ASIC};
use serde::{Deserialize, Serialize};

/// Per-channel register values
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub vth_t1: u8,
    pub vth_t2: u8,
    pub vth_e: u8,
    pub baseline_t: u8,
    pub baseline_e: u8,
    pub trigger_mode_1: u8,
    pub trigger_mode_2_b: u8,
    pub trigger_b_latched: u8,
    pub counter_mode: u8,
    pub dead_time: u8,
}

impl ChannelConfig {
    pub fn dac(&self, kind: ThresholdKind) -> u8 {
        match kind {
            ThresholdKind::T1 => self.vth_t1,
            ThresholdKind::T2 => self.vth_t2,
            ThresholdKind::E => self.vth_e,
        }
    }

    pub fn set_dac(&mut self, kind: ThresholdKind, value: u8) {
        match kind {
            ThresholdKind::T1 => self.vth_t1 = value,
            ThresholdKind::T2 => self.vth_t2 = value,
            ThresholdKind::E => self.vth_e = value,
        }
    }

    /// Baseline register backing `kind`: t1 and t2 share `baseline_t`,
    /// e uses `baseline_e`
    pub fn baseline(&self, kind: ThresholdKind) -> u8 {
        match kind {
            ThresholdKind::T1 | ThresholdKind::T2 => self.baseline_t,
            ThresholdKind::E => self.baseline_e,
        }
    }

    pub fn set_baseline(&mut self, kind: ThresholdKind, value: u8) {
        match kind {
            ThresholdKind::T1 | ThresholdKind::T2 => self.baseline_t = value,
            ThresholdKind::E => self.baseline_e = value,
        }
    }

    /// Zero all three threshold DACs
    pub fn reset_dacs(&mut self) {
        self.vth_t1 = 0;
        self.vth_t2 = 0;
        self.vth_e = 0;
    }
}

/// Registers shared by all channels of one chip
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub counter_en: u8,
    pub counter_period: u8,
}

/// Full configuration of every active ASIC
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AsicsConfigSnapshot {
    chips: Vec<(ChipAddress, GlobalConfig)>,
    channels: Vec<ChannelConfig>,
}

impl AsicsConfigSnapshot {
    /// Default-initialized configs for the given chips. Every address
    /// enumerated from these chips has exactly one channel slot.
    pub fn new(chips: &[ChipAddress]) -> Self {
        AsicsConfigSnapshot {
            chips: chips.iter().map(|&c| (c, GlobalConfig::default())).collect(),
            channels: vec![ChannelConfig::default(); chips.len() * CHANNELS_PER_ASIC],
        }
    }

    pub fn chips(&self) -> impl Iterator<Item = ChipAddress> + '_ {
        self.chips.iter().map(|(c, _)| *c)
    }

    pub fn n_chips(&self) -> usize {
        self.chips.len()
    }

    fn base(&self, chip: ChipAddress) -> usize {
        let pos = self
            .chips
            .iter()
            .position(|(c, _)| *c == chip)
            .unwrap_or_else(|| panic!("chip {:?} not in snapshot", chip));
        pos * CHANNELS_PER_ASIC
    }

    pub fn global(&self, chip: ChipAddress) -> &GlobalConfig {
        let pos = self.base(chip) / CHANNELS_PER_ASIC;
        &self.chips[pos].1
    }

    pub fn global_mut(&mut self, chip: ChipAddress) -> &mut GlobalConfig {
        let pos = self.base(chip) / CHANNELS_PER_ASIC;
        &mut self.chips[pos].1
    }

    pub fn channel(&self, addr: ChannelAddress) -> &ChannelConfig {
        &self.channels[self.base(addr.chip()) + addr.channel as usize]
    }

    pub fn channel_mut(&mut self, addr: ChannelAddress) -> &mut ChannelConfig {
        let i = self.base(addr.chip()) + addr.channel as usize;
        &mut self.channels[i]
    }

    /// Every channel of every chip, for whole-array register writes
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut ChannelConfig> {
        self.channels.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DAC_MAX;

    fn chips() -> Vec<ChipAddress> {
        vec![
            ChipAddress { port: 0, slave: 0, chip: 0 },
            ChipAddress { port: 0, slave: 0, chip: 1 },
            ChipAddress { port: 1, slave: 0, chip: 0 },
        ]
    }

    #[test]
    fn dac_and_baseline_register_mapping() {
        let mut cc = ChannelConfig::default();
        cc.set_dac(ThresholdKind::T1, 10);
        cc.set_dac(ThresholdKind::T2, 20);
        cc.set_dac(ThresholdKind::E, 30);
        assert_eq!((10, 20, 30), (cc.vth_t1, cc.vth_t2, cc.vth_e));

        cc.set_baseline(ThresholdKind::T1, 40);
        assert_eq!(40, cc.baseline(ThresholdKind::T2));
        assert_eq!(40, cc.baseline_t);
        cc.set_baseline(ThresholdKind::E, 50);
        assert_eq!(50, cc.baseline_e);
        assert_eq!(40, cc.baseline_t);

        cc.reset_dacs();
        assert_eq!((0, 0, 0), (cc.vth_t1, cc.vth_t2, cc.vth_e));
    }

    #[test]
    fn arena_addressing() {
        let chips = chips();
        let mut snap = AsicsConfigSnapshot::new(&chips);
        assert_eq!(3, snap.n_chips());

        let a = chips[0].channel(0);
        let b = chips[2].channel(DAC_MAX);
        snap.channel_mut(a).vth_t1 = 7;
        snap.channel_mut(b).vth_t1 = 9;
        assert_eq!(7, snap.channel(a).vth_t1);
        assert_eq!(9, snap.channel(b).vth_t1);
        // neighbors untouched
        assert_eq!(0, snap.channel(chips[0].channel(1)).vth_t1);
        assert_eq!(0, snap.channel(chips[1].channel(0)).vth_t1);
    }

    #[test]
    fn whole_array_writes() {
        let chips = chips();
        let mut snap = AsicsConfigSnapshot::new(&chips);
        for cc in snap.channels_mut() {
            cc.counter_mode = 0xF;
        }
        for chip in chips {
            for ch in 0..CHANNELS_PER_ASIC as u8 {
                assert_eq!(0xF, snap.channel(chip.channel(ch)).counter_mode);
            }
        }
    }

    #[test]
    fn snapshot_serde_roundtrip() {
        let snap = AsicsConfigSnapshot::new(&chips());
        let ser = serde_json::to_string(&snap).unwrap();
        let de: AsicsConfigSnapshot = serde_json::from_str(&ser).unwrap();
        assert_eq!(snap, de);
    }
}

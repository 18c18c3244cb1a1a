pub mod asic;
pub mod cfg;
pub mod grid;
pub mod ser;

use serde::{Deserialize, Serialize};

/// Saturation value of the per-channel hardware counters
pub const COUNT_MAX: u32 = 1 << 22;
/// Discriminator channels per front-end ASIC
pub const CHANNELS_PER_ASIC: usize = 64;
/// Top of the 6-bit threshold and baseline DAC range
pub const DAC_MAX: u8 = 63;

/// One front-end ASIC, reached through its FEB/D port and slave
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ChipAddress {
    pub port: u16,
    pub slave: u16,
    pub chip: u16,
}

/// One physical discriminator channel
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ChannelAddress {
    pub port: u16,
    pub slave: u16,
    pub chip: u16,
    pub channel: u8,
}

impl ChipAddress {
    pub fn channel(self, channel: u8) -> ChannelAddress {
        ChannelAddress {
            port: self.port,
            slave: self.slave,
            chip: self.chip,
            channel,
        }
    }
}

impl ChannelAddress {
    pub fn chip(self) -> ChipAddress {
        ChipAddress {
            port: self.port,
            slave: self.slave,
            chip: self.chip,
        }
    }
}

/// The three discriminator comparators, calibrated independently
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum ThresholdKind {
    T1,
    T2,
    E,
}

impl ThresholdKind {
    /// Canonical calibration order
    pub const ALL: [ThresholdKind; 3] = [ThresholdKind::T1, ThresholdKind::T2, ThresholdKind::E];

    /// Value the `trigger_mode_2_b` selector must hold at every counter read
    /// attributed to this kind
    pub fn index(self) -> u8 {
        match self {
            ThresholdKind::T1 => 0,
            ThresholdKind::T2 => 1,
            ThresholdKind::E => 2,
        }
    }

    /// DAC register name; also the `thresholdName` column in scan tables
    pub fn dac_name(self) -> &'static str {
        match self {
            ThresholdKind::T1 => "vth_t1",
            ThresholdKind::T2 => "vth_t2",
            ThresholdKind::E => "vth_e",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_order_and_selectors() {
        assert_eq!(3, ThresholdKind::ALL.len());
        for (i, kind) in ThresholdKind::ALL.iter().enumerate() {
            assert_eq!(i as u8, kind.index());
        }
        assert_eq!("vth_t1", ThresholdKind::T1.dac_name());
        assert_eq!("vth_t2", ThresholdKind::T2.dac_name());
        assert_eq!("vth_e", ThresholdKind::E.dac_name());
    }

    #[test]
    fn address_roundtrip() {
        let chip = ChipAddress { port: 3, slave: 0, chip: 2 };
        let ch = chip.channel(17);
        assert_eq!(17, ch.channel);
        assert_eq!(chip, ch.chip());
    }
}

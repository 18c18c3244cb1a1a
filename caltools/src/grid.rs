//! Enumeration of the addressable channel space

use crate::{ChannelAddress, ChipAddress, CHANNELS_PER_ASIC};
use itertools::iproduct;

/// The active chips and the channels they carry
#[derive(Clone, Debug)]
pub struct ChannelGrid {
    chips: Vec<ChipAddress>,
}

impl ChannelGrid {
    pub fn new(chips: Vec<ChipAddress>) -> Self {
        ChannelGrid { chips }
    }

    pub fn chips(&self) -> &[ChipAddress] {
        &self.chips
    }

    /// All channels in channel-major order: channel 0 on every chip, then
    /// channel 1, and so on. Baseline tables are written in this order.
    pub fn channels(&self) -> impl Iterator<Item = ChannelAddress> + '_ {
        iproduct!(0..CHANNELS_PER_ASIC as u8, self.chips.iter().copied())
            .map(|(ch, chip)| chip.channel(ch))
    }

    pub fn len(&self) -> usize {
        self.chips.len() * CHANNELS_PER_ASIC
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_major_order() {
        let grid = ChannelGrid::new(vec![
            ChipAddress { port: 0, slave: 0, chip: 0 },
            ChipAddress { port: 0, slave: 0, chip: 1 },
        ]);
        let channels: Vec<ChannelAddress> = grid.channels().collect();
        assert_eq!(grid.len(), channels.len());
        assert_eq!(2 * CHANNELS_PER_ASIC, channels.len());
        // channel 0 on both chips comes before channel 1 on any chip
        assert_eq!((0, 0), (channels[0].chip, channels[0].channel));
        assert_eq!((1, 0), (channels[1].chip, channels[1].channel));
        assert_eq!((0, 1), (channels[2].chip, channels[2].channel));
        assert_eq!(63, channels.last().unwrap().channel);
    }

    #[test]
    fn empty_grid() {
        let grid = ChannelGrid::new(Vec::new());
        assert!(grid.is_empty());
        assert_eq!(0, grid.channels().count());
    }
}

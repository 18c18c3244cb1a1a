//! Serialization of calibration tables as tab-separated values

use crate::ChannelAddress;
use anyhow::Result;
use std::io::Write;

/// One row of the baseline table
#[derive(Clone, Copy, Debug)]
pub struct BaselineRecord {
    pub addr: ChannelAddress,
    pub baseline_t: u8,
    pub baseline_e: u8,
}

/// One row of a noise or dark-count scan table
#[derive(Clone, Copy, Debug)]
pub struct ScanRecord {
    pub addr: ChannelAddress,
    pub threshold: &'static str,
    pub value: u8,
    pub count: f64,
}

/// Writer configured for the calibration tables: tab-separated, no header
pub fn writer<W: Write>(wtr: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(wtr)
}

/// Serialize one baseline row:
/// `portID slaveID chipID channelID baseline_t baseline_e`
pub fn baseline<W: Write>(wtr: &mut csv::Writer<W>, r: &BaselineRecord) -> Result<()> {
    wtr.write_record(&[
        r.addr.port.to_string(),
        r.addr.slave.to_string(),
        r.addr.chip.to_string(),
        r.addr.channel.to_string(),
        r.baseline_t.to_string(),
        r.baseline_e.to_string(),
    ])?;
    Ok(())
}

/// Serialize one scan row:
/// `portID slaveID chipID channelID thresholdName thresholdValue normalizedCount`
pub fn scan<W: Write>(wtr: &mut csv::Writer<W>, r: &ScanRecord) -> Result<()> {
    let mut buf = ryu::Buffer::new();
    wtr.write_record(&[
        r.addr.port.to_string(),
        r.addr.slave.to_string(),
        r.addr.chip.to_string(),
        r.addr.channel.to_string(),
        r.threshold.to_string(),
        r.value.to_string(),
        buf.format(r.count).to_string(),
    ])?;
    Ok(())
}

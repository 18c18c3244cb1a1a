//! Hardware adapter over the DAQ driver's control socket.
//!
//! daqd owns the GbE link to the front-end boards and exposes a
//! line-delimited JSON request/reply protocol on a Unix-domain socket.
//! Requests are answered strictly in order, and the driver acknowledges a
//! configuration push only once the full snapshot is applied, which gives
//! the push-before-read sequencing the calibration relies on.

use anyhow::{anyhow, bail, Context, Result};
use caltools::asic::AsicsConfigSnapshot;
use caltools::cfg::SystemConfig;
use caltools::ChipAddress;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::hw::{BiasLevel, Hardware};

#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Request<'a> {
    LoadBiasTables {
        calibration: Option<&'a Path>,
        settings: Option<&'a Path>,
    },
    InitializeSystem,
    GetActiveAsics,
    GetActiveFebds,
    GetAsicSubtype { port: u16, slave: u16, chip: u16 },
    GetSystemFrequency,
    GetAsicsConfig,
    SetAsicsConfig { config: &'a AsicsConfigSnapshot },
    ReadMemCtrl {
        port: u16,
        slave: u16,
        bank: u8,
        width: u8,
        offset: u32,
        count: u32,
    },
    SetBias { level: &'static str },
    GetFemPower { port: u16, slave: u16 },
    SetFemPower { port: u16, slave: u16, on: bool },
    GetSensorList,
    OpenAcquisition,
    CloseAcquisition,
}

#[derive(Deserialize)]
struct Reply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    value: serde_json::Value,
}

pub struct Daqd {
    stream: UnixStream,
    reader: BufReader<UnixStream>,
}

impl Daqd {
    /// Connect to the driver socket. Unless bias is controlled externally,
    /// the system config's bias tables are loaded into the driver here, so
    /// later [`BiasLevel`] transitions resolve to calibrated voltages.
    pub fn connect(socket: &Path, config: &SystemConfig, ext_bias: bool) -> Result<Daqd> {
        let stream = UnixStream::connect(socket)
            .with_context(|| format!("connecting to daqd at {}", socket.display()))?;
        let reader = BufReader::new(stream.try_clone()?);
        let mut daqd = Daqd { stream, reader };
        if !ext_bias {
            daqd.roundtrip(&Request::LoadBiasTables {
                calibration: config.bias_calibration.as_deref(),
                settings: config.bias_settings.as_deref(),
            })?;
        }
        Ok(daqd)
    }

    fn roundtrip(&mut self, req: &Request) -> Result<serde_json::Value> {
        let mut line = serde_json::to_string(req)?;
        line.push('\n');
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()?;

        let mut reply = String::new();
        self.reader.read_line(&mut reply)?;
        if reply.is_empty() {
            bail!("daqd closed the control socket");
        }
        let reply: Reply = serde_json::from_str(&reply).context("malformed daqd reply")?;
        if !reply.ok {
            bail!(
                "daqd: {}",
                reply.error.unwrap_or_else(|| String::from("unspecified error"))
            );
        }
        Ok(reply.value)
    }

    fn call<T: serde::de::DeserializeOwned>(&mut self, req: &Request) -> Result<T> {
        let value = self.roundtrip(req)?;
        serde_json::from_value(value).map_err(|e| anyhow!("unexpected daqd reply: {}", e))
    }
}

impl Hardware for Daqd {
    fn initialize_system(&mut self) -> Result<()> {
        self.roundtrip(&Request::InitializeSystem)?;
        Ok(())
    }

    fn active_asics(&mut self) -> Result<Vec<ChipAddress>> {
        self.call(&Request::GetActiveAsics)
    }

    fn active_febds(&mut self) -> Result<Vec<(u16, u16)>> {
        self.call(&Request::GetActiveFebds)
    }

    fn asic_subtype(&mut self, chip: ChipAddress) -> Result<String> {
        self.call(&Request::GetAsicSubtype {
            port: chip.port,
            slave: chip.slave,
            chip: chip.chip,
        })
    }

    fn system_frequency(&mut self) -> Result<f64> {
        self.call(&Request::GetSystemFrequency)
    }

    fn get_asics_config(&mut self) -> Result<AsicsConfigSnapshot> {
        self.call(&Request::GetAsicsConfig)
    }

    fn set_asics_config(&mut self, snapshot: &AsicsConfigSnapshot) -> Result<()> {
        self.roundtrip(&Request::SetAsicsConfig { config: snapshot })?;
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
        self.call(&Request::ReadMemCtrl {
            port,
            slave,
            bank,
            width,
            offset,
            count,
        })
    }

    fn set_bias(&mut self, level: BiasLevel) -> Result<()> {
        let level = match level {
            BiasLevel::Off => "off",
            BiasLevel::PreBreakdown => "prebd",
            BiasLevel::On => "on",
        };
        self.roundtrip(&Request::SetBias { level })?;
        Ok(())
    }

    fn fem_power_status(&mut self, port: u16, slave: u16) -> Result<bool> {
        self.call(&Request::GetFemPower { port, slave })
    }

    fn set_fem_power(&mut self, port: u16, slave: u16, on: bool) -> Result<()> {
        self.roundtrip(&Request::SetFemPower { port, slave, on })?;
        Ok(())
    }

    fn sensor_list(&mut self) -> Result<Vec<String>> {
        self.call(&Request::GetSensorList)
    }

    fn open_acquisition(&mut self) -> Result<()> {
        self.roundtrip(&Request::OpenAcquisition)?;
        Ok(())
    }

    fn close_acquisition(&mut self) -> Result<()> {
        self.roundtrip(&Request::CloseAcquisition)?;
        Ok(())
    }
}

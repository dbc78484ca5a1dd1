//! STLINK-V3 session and `SpiMaster` implementation

use std::collections::HashMap;
use std::time::Duration;

use bridgeflash_core::error::{Error as CoreError, Result as CoreResult};
use bridgeflash_core::programmer::{SpiFeatures, SpiMaster};
use bridgeflash_core::spi::SpiCommand;

use crate::bridge::{Bridge, NssGuard};
use crate::error::{Result, StLinkV3Error};
use crate::protocol::{
    ClockConfig, SpiInit, VersionInfo, DEFAULT_SPISPEED_KHZ, MAX_TRANSFER_LEN,
};
use crate::transport::{Transport, UsbTransport};

/// Configuration for opening an STLINK-V3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StLinkV3Config {
    /// USB serial number to match (None = use first device found)
    pub serial: Option<String>,
    /// Requested SCK frequency in kHz
    pub spispeed_khz: u16,
}

impl Default for StLinkV3Config {
    fn default() -> Self {
        Self {
            serial: None,
            spispeed_khz: DEFAULT_SPISPEED_KHZ,
        }
    }
}

/// An open SPI session on an STLINK-V3 bridge
///
/// The session exclusively owns its transport. Every operation takes
/// `&mut self`, so transactions are serialized by the borrow checker.
/// Dropping the session closes the bridge SPI function on a best-effort
/// basis; call [`StLinkV3::close`] to do it explicitly.
pub struct StLinkV3<T: Transport = UsbTransport> {
    bridge: Bridge<T>,
    version: VersionInfo,
    clock: ClockConfig,
    closed: bool,
}

impl StLinkV3<UsbTransport> {
    /// Open the first STLINK-V3 at the default SCK frequency
    pub fn open() -> Result<Self> {
        Self::open_with_config(&StLinkV3Config::default())
    }

    /// Open an STLINK-V3 with specific configuration
    pub fn open_with_config(config: &StLinkV3Config) -> Result<Self> {
        validate_speed(config.spispeed_khz)?;
        let transport = UsbTransport::open(config.serial.as_deref())?;
        Self::with_transport(transport, config.spispeed_khz)
    }
}

impl<T: Transport> StLinkV3<T> {
    /// Bring up the SPI bridge on an already open transport
    ///
    /// Checks the firmware version, negotiates the SCK prescaler and
    /// initialises the SPI master. If any step fails the transport is
    /// dropped without sending a close command.
    pub fn with_transport(transport: T, requested_khz: u16) -> Result<Self> {
        validate_speed(requested_khz)?;

        let mut bridge = Bridge::new(transport);
        let version = bridge.check_version()?;
        let clock = bridge.calc_prescaler(requested_khz)?;
        bridge.init_spi(SpiInit::flash(clock.prescaler))?;

        log::info!("SCK frequency set to {} kHz", clock.sck_khz);

        Ok(Self {
            bridge,
            version,
            clock,
            closed: false,
        })
    }

    /// Firmware versions reported at open
    pub fn version(&self) -> &VersionInfo {
        &self.version
    }

    /// Negotiated SCK settings
    pub fn clock(&self) -> &ClockConfig {
        &self.clock
    }

    /// Run one SPI transaction: write `write`, then read `read_len` bytes
    pub fn transact(&mut self, write: &[u8], read_len: usize) -> Result<Vec<u8>> {
        let mut read = vec![0u8; read_len];
        self.transact_into(write, &mut read)?;
        Ok(read)
    }

    /// Run one SPI transaction, reading into `read`
    ///
    /// NSS is driven low before the write and high again on every exit
    /// path. If raising NSS fails after an earlier error, that failure is
    /// logged and the earlier error is returned.
    pub fn transact_into(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        for len in [write.len(), read.len()] {
            if len > MAX_TRANSFER_LEN {
                return Err(StLinkV3Error::TransferTooLong(len));
            }
        }

        let mut cs = NssGuard::select(&mut self.bridge)?;

        cs.write_spi(write)?;
        cs.check_rw_status()?;

        if !read.is_empty() {
            cs.read_spi(read)?;
        }
        cs.check_rw_status()?;

        cs.release()
    }

    /// Close the bridge SPI function and release the device
    ///
    /// Failures are logged; the transport is released regardless.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        log::debug!("Closing STLINK-V3 SPI bridge");
        if let Err(e) = self.bridge.close_bridge() {
            log::warn!("Failed to close the SPI bridge: {}", e);
        }
    }
}

impl<T: Transport> Drop for StLinkV3<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport> SpiMaster for StLinkV3<T> {
    fn features(&self) -> SpiFeatures {
        // Addresses are encoded in software, so any width works
        SpiFeatures::FOUR_BYTE_ADDR
    }

    fn max_read_len(&self) -> usize {
        MAX_TRANSFER_LEN
    }

    fn max_write_len(&self) -> usize {
        MAX_TRANSFER_LEN
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        let header_len = cmd.header_len();
        let mut write_data = vec![0u8; header_len + cmd.write_data.len()];
        cmd.encode_header(&mut write_data);
        write_data[header_len..].copy_from_slice(cmd.write_data);

        log::debug!(
            "SPI execute: opcode=0x{:02X}, write_len={}, read_len={}",
            cmd.opcode,
            write_data.len(),
            cmd.read_buf.len()
        );

        self.transact_into(&write_data, cmd.read_buf).map_err(|e| {
            log::error!("SPI transfer failed: {}", e);
            CoreError::from(e)
        })
    }

    fn delay_us(&mut self, us: u32) {
        if us > 0 {
            std::thread::sleep(Duration::from_micros(us as u64));
        }
    }
}

fn validate_speed(khz: u16) -> Result<()> {
    if khz == 0 {
        return Err(StLinkV3Error::ConfigError(
            "spispeed must be at least 1 kHz".to_string(),
        ));
    }
    Ok(())
}

/// Parse programmer options from key-value pairs
///
/// Supported options:
/// - `serial=<serial>` - USB serial number to match
/// - `spispeed=<kHz>` - SCK frequency in kHz, decimal (default 1000)
pub fn parse_options(options: &[(&str, &str)]) -> Result<StLinkV3Config> {
    let mut config = StLinkV3Config::default();
    let mut seen = HashMap::new();

    for (key, value) in options {
        if seen.insert(*key, *value).is_some() {
            return Err(StLinkV3Error::ConfigError(format!(
                "Option given twice: {}",
                key
            )));
        }

        match *key {
            "serial" => {
                if value.is_empty() {
                    return Err(StLinkV3Error::ConfigError(
                        "serial must not be empty".to_string(),
                    ));
                }
                config.serial = Some(value.to_string());
            }
            "spispeed" => {
                config.spispeed_khz = value.parse().map_err(|_| {
                    StLinkV3Error::ConfigError(format!(
                        "Invalid spispeed '{}': expected a frequency in kHz (1-65535)",
                        value
                    ))
                })?;
                validate_speed(config.spispeed_khz)?;
            }
            _ => {
                return Err(StLinkV3Error::ConfigError(format!(
                    "Unknown option: {}",
                    key
                )));
            }
        }
    }

    Ok(config)
}

//! bridgeflash-stlinkv3 - STLINK-V3 bridge SPI programmer support
//!
//! The STLINK-V3 debug probe exposes a "bridge" function next to its debug
//! port. Among other buses the bridge drives an SPI master, which this crate
//! uses to reach a SPI NOR flash wired to the probe.
//!
//! # Protocol Overview
//!
//! Every request is a 16-byte command frame sent on bulk OUT endpoint 0x06;
//! answers come back on bulk IN endpoint 0x86 with a fixed length per
//! command. Long writes append a raw continuation transfer after the frame
//! and reads fetch raw data after the read frame. The bridge firmware must
//! report version 3 or newer.
//!
//! A session goes through these steps:
//!
//! 1. check the bridge firmware version
//! 2. read the bridge input clock and pick the SCK prescaler
//! 3. initialise the SPI master (mode 0, MSB first, 8-bit, software NSS)
//! 4. run transactions, each one framed by NSS low/high
//! 5. close the bridge SPI function
//!
//! # Example
//!
//! ```no_run
//! use bridgeflash_stlinkv3::{StLinkV3, StLinkV3Config};
//! use bridgeflash_core::programmer::SpiMaster;
//! use bridgeflash_core::spi::{SpiCommand, opcodes};
//!
//! let config = StLinkV3Config {
//!     serial: None,
//!     spispeed_khz: 4000,
//! };
//! let mut stlink = StLinkV3::open_with_config(&config)?;
//!
//! let mut id = [0u8; 3];
//! let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut id);
//! stlink.execute(&mut cmd)?;
//! println!("JEDEC ID: {:02X} {:02X} {:02X}", id[0], id[1], id[2]);
//! stlink.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(rust_2018_idioms)]

mod bridge;
mod device;
mod error;
pub mod protocol;
mod transport;

#[cfg(test)]
mod mock;

pub use bridge::{Bridge, NssGuard};
pub use device::{parse_options, StLinkV3, StLinkV3Config};
pub use error::{Result, StLinkV3Error};
pub use protocol::{ClockConfig, Prescaler};
pub use transport::{Transport, UsbTransport};

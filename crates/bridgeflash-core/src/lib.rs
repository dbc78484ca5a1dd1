//! bridgeflash-core - SPI master abstraction for bridgeflash
//!
//! This crate defines the boundary between programmer drivers and the
//! generic flash command layer:
//!
//! - [`programmer::SpiMaster`] is implemented by every programmer. It executes
//!   one complete SPI transaction (chip select asserted for its duration).
//! - [`spi::SpiCommand`] describes such a transaction without allocating.
//! - [`protocol`] builds the usual SPI25 sequences (JEDEC ID, read, page
//!   program, sector erase) on top of a single `execute` primitive.
//!
//! # Example
//!
//! ```ignore
//! use bridgeflash_core::{protocol, programmer::SpiMaster};
//!
//! fn identify<M: SpiMaster>(master: &mut M) {
//!     match protocol::read_jedec_id(master) {
//!         Ok((mfr, dev)) => println!("JEDEC ID: {:02X} {:04X}", mfr, dev),
//!         Err(e) => println!("Probe failed: {}", e),
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod programmer;
pub mod protocol;
pub mod spi;

pub use error::{Error, Result};

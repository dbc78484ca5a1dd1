//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions and the
//! subset of JEDEC opcodes used by the SPI25 layer.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;

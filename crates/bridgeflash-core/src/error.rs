//! Error types for bridgeflash-core
//!
//! Programmer crates keep their own detailed error types and convert into
//! this one at the `SpiMaster` boundary.

use core::fmt;

/// Core error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // SPI errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// SPI operation timed out
    SpiTimeout,

    // Chip errors
    /// Flash chip not found (JEDEC ID read back as all 0x00 or all 0xFF)
    ChipNotFound,

    // Operation errors
    /// Operation timed out (e.g. WIP never cleared)
    Timeout,

    // Address/size errors
    /// Address is beyond the addressable range
    AddressOutOfBounds,
    /// Operation requires aligned address or size
    InvalidAlignment,
    /// Provided buffer does not fit in a single transaction
    BufferTooLarge,

    // Programmer errors
    /// General programmer error
    ProgrammerError,
    /// 4-byte addressing requested but not supported by the programmer
    FourByteAddrNotSupported,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::SpiTimeout => write!(f, "SPI operation timed out"),
            Self::ChipNotFound => write!(f, "flash chip not found"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
            Self::BufferTooLarge => write!(f, "buffer too large for a single transaction"),
            Self::ProgrammerError => write!(f, "programmer error"),
            Self::FourByteAddrNotSupported => {
                write!(f, "4-byte addressing not supported by programmer")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

//! Error types for the STLINK-V3 bridge programmer

use bridgeflash_core::error::Error as CoreError;
use thiserror::Error;

/// Errors that can occur when using the STLINK-V3 bridge
#[derive(Debug, Error)]
pub enum StLinkV3Error {
    /// No STLINK-V3 on the bus
    #[error("STLINK-V3 not found (VID:0483 PID:374F)")]
    DeviceNotFound,

    /// No STLINK-V3 with the requested serial number
    #[error("No STLINK-V3 with serial number {0}")]
    SerialNotFound(String),

    /// Failed to open device
    #[error("Failed to open STLINK-V3: {0}")]
    OpenFailed(String),

    /// Failed to claim the bridge interface
    #[error("Failed to claim interface: {0}")]
    ClaimFailed(String),

    /// The active configuration has no interface owning this endpoint
    #[error("No interface with endpoint 0x{0:02X}")]
    EndpointNotFound(u8),

    /// USB transfer did not complete
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// USB transfer moved fewer or more bytes than the frame requires
    #[error("Short transfer during {what}: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Command or phase in progress
        what: &'static str,
        /// Bytes the protocol requires
        expected: usize,
        /// Bytes actually transferred
        actual: usize,
    },

    /// USB transfer hit the 5 s timeout
    #[error("Timeout during USB transfer")]
    Timeout,

    /// The bridge reported a nonzero read/write status
    #[error("SPI read/write failure: {0}")]
    SpiStatus(u32),

    /// Bridge firmware below the minimum supported version
    #[error(
        "Bridge firmware version {found} is too old, version {required} or newer is required \
         (update with STSW-LINK007)"
    )]
    FirmwareTooOld {
        /// Version reported by the probe
        found: u8,
        /// Minimum supported version
        required: u8,
    },

    /// Invalid programmer options
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Transfer length does not fit the 16-bit length field
    #[error("Transfer of {0} bytes exceeds the 65535 byte limit")]
    TransferTooLong(usize),
}

/// Result type for STLINK-V3 operations
pub type Result<T> = std::result::Result<T, StLinkV3Error>;

impl From<nusb::Error> for StLinkV3Error {
    fn from(e: nusb::Error) -> Self {
        StLinkV3Error::TransferFailed(e.to_string())
    }
}

impl From<nusb::transfer::TransferError> for StLinkV3Error {
    fn from(e: nusb::transfer::TransferError) -> Self {
        match e {
            nusb::transfer::TransferError::Cancelled => StLinkV3Error::Timeout,
            other => StLinkV3Error::TransferFailed(other.to_string()),
        }
    }
}

impl From<StLinkV3Error> for CoreError {
    fn from(e: StLinkV3Error) -> Self {
        match e {
            StLinkV3Error::Timeout => CoreError::SpiTimeout,
            StLinkV3Error::TransferTooLong(_) => CoreError::BufferTooLarge,
            StLinkV3Error::TransferFailed(_)
            | StLinkV3Error::ShortTransfer { .. }
            | StLinkV3Error::SpiStatus(_) => CoreError::SpiTransferFailed,
            _ => CoreError::ProgrammerError,
        }
    }
}

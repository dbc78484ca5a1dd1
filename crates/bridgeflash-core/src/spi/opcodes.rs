//! JEDEC SPI flash opcodes

/// Write Enable
pub const WREN: u8 = 0x06;
/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read JEDEC ID
pub const RDID: u8 = 0x9F;

/// Read data (3-byte address)
pub const READ: u8 = 0x03;
/// Read data (4-byte address)
pub const READ_4B: u8 = 0x13;

/// Page Program (3-byte address)
pub const PP: u8 = 0x02;
/// Page Program (4-byte address)
pub const PP_4B: u8 = 0x12;

/// 4 KiB sector erase (3-byte address)
pub const SE_20: u8 = 0x20;
/// 4 KiB sector erase (4-byte address)
pub const SE_21: u8 = 0x21;
/// Chip erase
pub const CE_C7: u8 = 0xC7;

/// Status register 1: write in progress
pub const SR1_WIP: u8 = 0x01;

/// Page size used by page program
pub const PAGE_SIZE: usize = 256;
/// Smallest erase unit
pub const SECTOR_SIZE: usize = 4096;

//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address, up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address
    FourByte,
}

impl AddressWidth {
    /// Number of address bytes on the wire
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Size of the address space reachable with this width
    pub const fn max_size(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 1 << 24,
            Self::FourByte => 1 << 32,
        }
    }

    /// Write `address` big-endian into the start of `buf`
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        let n = self.bytes() as usize;
        let be = address.to_be_bytes();
        buf[..n].copy_from_slice(&be[4 - n..]);
    }
}

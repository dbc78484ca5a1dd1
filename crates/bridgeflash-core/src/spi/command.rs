//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Uses slices for data so building a command never allocates.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Number of dummy cycles after address (single I/O, so multiples of 8)
    pub dummy_cycles: u8,

    /// Data to write after opcode/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    fn new(opcode: u8, address: Option<u32>, address_width: AddressWidth) -> Self {
        Self {
            opcode,
            address,
            address_width,
            dummy_cycles: 0,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Command with no address or data (WREN, CE)
    pub fn simple(opcode: u8) -> Self {
        Self::new(opcode, None, AddressWidth::None)
    }

    /// Read register command with no address (RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::new(opcode, None, AddressWidth::None)
        }
    }

    /// Read command with an address of the given width
    pub fn read(opcode: u8, addr: u32, width: AddressWidth, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::new(opcode, Some(addr), width)
        }
    }

    /// Write command with an address of the given width (PP)
    pub fn write(opcode: u8, addr: u32, width: AddressWidth, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::new(opcode, Some(addr), width)
        }
    }

    /// Erase command with an address of the given width
    pub fn erase(opcode: u8, addr: u32, width: AddressWidth) -> Self {
        Self::new(opcode, Some(addr), width)
    }

    /// Set the number of dummy cycles
    pub fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Length of opcode + address + dummy bytes
    pub fn header_len(&self) -> usize {
        let addr = match self.address {
            Some(_) => self.address_width.bytes() as usize,
            None => 0,
        };
        1 + addr + (self.dummy_cycles as usize).div_ceil(8)
    }

    /// Write the header into `buf`, returning the number of bytes used
    ///
    /// Dummy bytes are sent as 0xFF. `buf` must hold at least
    /// [`header_len`](Self::header_len) bytes.
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        let len = self.header_len();
        buf[0] = self.opcode;
        let mut pos = 1;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[pos..]);
            pos += self.address_width.bytes() as usize;
        }
        buf[pos..len].fill(0xFF);
        len
    }
}

//! SPI25 protocol implementation
//!
//! Common JEDEC flash sequences: identification, status polling, chunked
//! reads, page programming and 4 KiB sector erase. Transfers are split so
//! every transaction fits the programmer's `max_read_len`/`max_write_len`.

use crate::error::{Error, Result};
use crate::programmer::{SpiFeatures, SpiMaster};
use crate::spi::{opcodes, AddressWidth, SpiCommand};

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success. An ID of all zeros or
/// all ones means nothing answered and is reported as `ChipNotFound`.
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;

    if buf == [0x00; 3] || buf == [0xFF; 3] {
        return Err(Error::ChipNotFound);
    }

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);
    log::debug!("JEDEC ID: {:02X} {:04X}", manufacturer, device);

    Ok((manufacturer, device))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning Error::Timeout
pub fn wait_ready<M: SpiMaster + ?Sized>(
    master: &mut M,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    let max_polls = (timeout_us / poll_delay_us.max(1)).max(1);

    for _ in 0..max_polls {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    log::warn!("Flash still busy after {} us", timeout_us);
    Err(Error::Timeout)
}

/// Pick the address width needed to reach `end` (exclusive)
///
/// Anything past 16 MiB needs 4-byte opcodes, which the programmer has to
/// advertise through [`SpiFeatures::FOUR_BYTE_ADDR`].
pub fn address_width_for<M: SpiMaster + ?Sized>(master: &M, end: u64) -> Result<AddressWidth> {
    if end <= AddressWidth::ThreeByte.max_size() {
        Ok(AddressWidth::ThreeByte)
    } else if end > AddressWidth::FourByte.max_size() {
        Err(Error::AddressOutOfBounds)
    } else if master.features().contains(SpiFeatures::FOUR_BYTE_ADDR) {
        Ok(AddressWidth::FourByte)
    } else {
        Err(Error::FourByteAddrNotSupported)
    }
}

fn read_opcode(width: AddressWidth) -> u8 {
    match width {
        AddressWidth::FourByte => opcodes::READ_4B,
        _ => opcodes::READ,
    }
}

fn program_opcode(width: AddressWidth) -> u8 {
    match width {
        AddressWidth::FourByte => opcodes::PP_4B,
        _ => opcodes::PP,
    }
}

fn erase_opcode(width: AddressWidth) -> u8 {
    match width {
        AddressWidth::FourByte => opcodes::SE_21,
        _ => opcodes::SE_20,
    }
}

/// Read `buf.len()` bytes starting at `addr`
///
/// `progress` is called with the number of bytes completed by each chunk.
pub fn read<M, F>(master: &mut M, addr: u32, buf: &mut [u8], mut progress: F) -> Result<()>
where
    M: SpiMaster + ?Sized,
    F: FnMut(usize),
{
    let width = address_width_for(master, addr as u64 + buf.len() as u64)?;
    let chunk_size = master.max_read_len();
    if chunk_size == 0 {
        return Err(Error::BufferTooLarge);
    }

    let mut offset = 0usize;
    for chunk in buf.chunks_mut(chunk_size) {
        let len = chunk.len();
        let mut cmd = SpiCommand::read(read_opcode(width), addr + offset as u32, width, chunk);
        master.execute(&mut cmd)?;
        offset += len;
        progress(len);
    }

    Ok(())
}

/// Program a single page
///
/// `data` must not cross a page boundary.
pub fn program_page<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    width: AddressWidth,
    data: &[u8],
) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::write(program_opcode(width), addr, width, data);
    master.execute(&mut cmd)?;

    // Page program: poll every 10us, timeout after 10ms (typical is 0.7-5ms)
    wait_ready(master, 10, 10_000)
}

/// Write `data` starting at `addr` using page program
///
/// The target range must already be erased. Chunks never cross a 256-byte
/// page boundary and never exceed what the programmer accepts in one
/// transaction.
pub fn write<M, F>(master: &mut M, addr: u32, data: &[u8], mut progress: F) -> Result<()>
where
    M: SpiMaster + ?Sized,
    F: FnMut(usize),
{
    let width = address_width_for(master, addr as u64 + data.len() as u64)?;
    let header = 1 + width.bytes() as usize;
    let max_data = master
        .max_write_len()
        .checked_sub(header)
        .filter(|n| *n > 0)
        .ok_or(Error::BufferTooLarge)?;

    let mut offset = 0usize;
    while offset < data.len() {
        let cur = addr as usize + offset;
        let page_left = opcodes::PAGE_SIZE - (cur % opcodes::PAGE_SIZE);
        let len = page_left.min(max_data).min(data.len() - offset);

        program_page(master, cur as u32, width, &data[offset..offset + len])?;
        offset += len;
        progress(len);
    }

    Ok(())
}

/// Erase the 4 KiB sector containing `addr`
pub fn erase_sector_4k<M: SpiMaster + ?Sized>(
    master: &mut M,
    addr: u32,
    width: AddressWidth,
) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::erase(erase_opcode(width), addr, width);
    master.execute(&mut cmd)?;

    // 4KB sector: poll every 10ms, timeout after 1s (typical 45-400ms)
    wait_ready(master, 10_000, 1_000_000)
}

/// Erase `len` bytes starting at `addr` sector by sector
///
/// Both `addr` and `len` must be multiples of 4 KiB.
pub fn erase<M, F>(master: &mut M, addr: u32, len: u32, mut progress: F) -> Result<()>
where
    M: SpiMaster + ?Sized,
    F: FnMut(usize),
{
    let sector = opcodes::SECTOR_SIZE as u32;
    if addr % sector != 0 || len % sector != 0 {
        return Err(Error::InvalidAlignment);
    }
    let end = addr.checked_add(len).ok_or(Error::AddressOutOfBounds)?;
    let width = address_width_for(master, end as u64)?;

    for sector_addr in (addr..end).step_by(opcodes::SECTOR_SIZE) {
        erase_sector_4k(master, sector_addr, width)?;
        progress(opcodes::SECTOR_SIZE);
    }

    Ok(())
}

/// Erase the entire chip
///
/// Chip erase typically takes 25-100s for large chips.
/// We poll every 1s with a 200s timeout.
pub fn chip_erase<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::simple(opcodes::CE_C7);
    master.execute(&mut cmd)?;

    wait_ready(master, 1_000_000, 200_000_000)
}

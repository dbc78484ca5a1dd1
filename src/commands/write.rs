//! Write command implementation

use bridgeflash_core::programmer::SpiMaster;
use bridgeflash_core::protocol;
use bridgeflash_core::spi::opcodes::SECTOR_SIZE;
use std::fs;
use std::path::Path;

/// Run the write command
pub fn run_write<M: SpiMaster + ?Sized>(
    master: &mut M,
    input: &Path,
    address: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    if data.is_empty() {
        return Err(format!("{:?} is empty", input).into());
    }

    if erase {
        let len = erase_span(address, data.len())?;
        if len as usize != data.len() {
            log::warn!(
                "Erasing {} bytes past the end of the image to reach a sector boundary",
                len as usize - data.len()
            );
        }
        super::erase::erase_region_with_progress(master, address, len)?;
    }

    let pb = super::byte_progress(data.len() as u64, "Writing");
    protocol::write(master, address, &data, |n| pb.inc(n as u64))?;
    pb.finish_with_message("Write complete");

    if verify {
        let readback = super::read::read_with_progress(master, address, data.len())?;
        if let Some(pos) = first_mismatch(&data, &readback) {
            return Err(format!(
                "Verification failed at 0x{:08X}: wrote 0x{:02X}, read 0x{:02X}",
                address as usize + pos,
                data[pos],
                readback[pos]
            )
            .into());
        }
        println!("Verified {} bytes", data.len());
    }

    println!("Wrote {} bytes at 0x{:08X}", data.len(), address);
    Ok(())
}

/// Length of the sector-aligned range covering `len` bytes at `address`
fn erase_span(address: u32, len: usize) -> Result<u32, Box<dyn std::error::Error>> {
    if address as usize % SECTOR_SIZE != 0 {
        return Err(format!(
            "--erase needs a {} byte aligned address, got 0x{:08X}",
            SECTOR_SIZE, address
        )
        .into());
    }
    let span = len.div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
    u32::try_from(span).map_err(|_| "image too large".into())
}

fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected.iter().zip(actual).position(|(a, b)| a != b)
}

//! Erase command implementation

use bridgeflash_core::programmer::SpiMaster;
use bridgeflash_core::protocol;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Run the erase command
pub fn run_erase<M: SpiMaster + ?Sized>(
    master: &mut M,
    address: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    match length {
        Some(len) => {
            erase_region_with_progress(master, address, len)?;
            println!("Erased {} bytes starting at 0x{:08X}", len, address);
        }
        None if address != 0 => {
            return Err("--length is required when --address is given".into());
        }
        None => {
            chip_erase_with_progress(master)?;
            println!("Chip erase complete");
        }
    }

    Ok(())
}

/// Erase entire chip with progress spinner
pub fn chip_erase_with_progress<M: SpiMaster + ?Sized>(
    master: &mut M,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Erasing chip (this may take a while)...");
    pb.enable_steady_tick(Duration::from_millis(100));

    protocol::chip_erase(master)?;

    pb.finish_with_message("Chip erased");
    Ok(())
}

/// Erase a sector-aligned region with progress bar
pub fn erase_region_with_progress<M: SpiMaster + ?Sized>(
    master: &mut M,
    start: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = super::byte_progress(length as u64, "Erasing");
    protocol::erase(master, start, length, |n| pb.inc(n as u64))?;
    pb.finish_with_message("Erase complete");
    Ok(())
}

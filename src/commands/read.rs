//! Read command implementation

use bridgeflash_core::programmer::SpiMaster;
use bridgeflash_core::protocol;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Run the read command
pub fn run_read<M: SpiMaster + ?Sized>(
    master: &mut M,
    output: &Path,
    address: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_with_progress(master, address, length as usize)?;

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}

/// Read `length` bytes at `address` with a progress bar
pub fn read_with_progress<M: SpiMaster + ?Sized>(
    master: &mut M,
    address: u32,
    length: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut data = vec![0u8; length];

    let pb = super::byte_progress(length as u64, "Reading");
    protocol::read(master, address, &mut data, |n| pb.inc(n as u64))?;
    pb.finish_with_message("Read complete");

    Ok(data)
}

//! Probe command implementation

use bridgeflash_core::programmer::SpiMaster;
use bridgeflash_core::protocol;

/// Probe the attached chip using its JEDEC ID
pub fn run_probe<M: SpiMaster + ?Sized>(master: &mut M) -> Result<(), Box<dyn std::error::Error>> {
    match protocol::read_jedec_id(master) {
        Ok((mfr, dev)) => {
            println!("Found flash chip:");
            println!("  JEDEC ID: {:02X} {:04X}", mfr, dev);
            let status = protocol::read_status1(master)?;
            println!("  Status:   0x{:02X}", status);
            Ok(())
        }
        Err(e) => {
            eprintln!("Probe failed: {}", e);
            Err(Box::new(e))
        }
    }
}

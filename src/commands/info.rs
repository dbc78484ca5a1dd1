//! Info command implementation

use crate::programmers::Programmer;
use bridgeflash_core::programmer::SpiMaster;
use bridgeflash_core::protocol;

/// Print programmer details and, if a chip answers, its JEDEC ID
pub fn run_info(prog: &mut Programmer) -> Result<(), Box<dyn std::error::Error>> {
    prog.print_info();

    let master = prog.as_spi_mut();
    println!("  Max transfer:    {} bytes", master.max_read_len());

    match protocol::read_jedec_id(master) {
        Ok((mfr, dev)) => println!("Flash JEDEC ID:    {:02X} {:04X}", mfr, dev),
        Err(e) => println!("Flash JEDEC ID:    unavailable ({})", e),
    }

    Ok(())
}

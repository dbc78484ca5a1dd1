//! bridgeflash - SPI flash programmer for USB bridges
//!
//! Opens a programmer (currently the STLINK-V3 bridge), then reads, writes
//! or erases the SPI NOR flash attached to it through the generic SPI25
//! command layer.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

/// Log level selected by the number of `-v` flags
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG still wins when set
    let level = log_level(cli.verbose);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .init();

    let result = match cli.command {
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::Info { programmer } => {
            let mut prog = programmers::open_programmer(&programmer)?;
            let result = commands::info::run_info(&mut prog);
            prog.close();
            result
        }
        Commands::Probe { programmer } => {
            let mut prog = programmers::open_programmer(&programmer)?;
            let result = commands::probe::run_probe(prog.as_spi_mut());
            prog.close();
            result
        }
        Commands::Read {
            programmer,
            output,
            address,
            length,
        } => {
            let mut prog = programmers::open_programmer(&programmer)?;
            let result = commands::read::run_read(prog.as_spi_mut(), &output, address, length);
            prog.close();
            result
        }
        Commands::Write {
            programmer,
            input,
            address,
            erase,
            no_verify,
        } => {
            let mut prog = programmers::open_programmer(&programmer)?;
            let result = commands::write::run_write(
                prog.as_spi_mut(),
                &input,
                address,
                erase,
                !no_verify,
            );
            prog.close();
            result
        }
        Commands::Erase {
            programmer,
            address,
            length,
        } => {
            let mut prog = programmers::open_programmer(&programmer)?;
            let result = commands::erase::run_erase(prog.as_spi_mut(), address, length);
            prog.close();
            result
        }
    };

    result
}

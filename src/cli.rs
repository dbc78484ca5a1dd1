//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, e.g. stlinkv3:spispeed=4000 [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "bridgeflash")]
#[command(author, version, about = "SPI flash programmer for USB bridges", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show programmer details and the negotiated SPI clock
    Info {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// Read the JEDEC ID of the attached flash chip
    Probe {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// Read flash contents to file
    Read {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Start address (hex with 0x prefix, or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to read (hex with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Write file to flash
    Write {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Start address (hex with 0x prefix, or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Erase the covered 4 KiB sectors first (address must be sector aligned)
        #[arg(long)]
        erase: bool,

        /// Skip reading back the written data
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase flash sectors, or the whole chip if no length is given
    Erase {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Start address, 4 KiB aligned
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to erase, multiple of 4 KiB
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// List available programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x1000"), Ok(0x1000));
        assert_eq!(parse_hex_u32("0XfF"), Ok(0xFF));
        assert_eq!(parse_hex_u32("4096"), Ok(4096));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("ten").is_err());
    }

    #[test]
    fn test_cli_read() {
        let cli = Cli::try_parse_from([
            "bridgeflash",
            "-v",
            "read",
            "-p",
            "stlinkv3:spispeed=8000",
            "-o",
            "dump.bin",
            "--length",
            "0x100000",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Read {
                programmer,
                address,
                length,
                ..
            } => {
                assert_eq!(programmer, "stlinkv3:spispeed=8000");
                assert_eq!(address, 0);
                assert_eq!(length, 0x100000);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_cli_erase_without_length() {
        let cli = Cli::try_parse_from(["bridgeflash", "erase", "-p", "stlinkv3"]).unwrap();
        assert!(matches!(cli.command, Commands::Erase { length: None, .. }));
    }
}

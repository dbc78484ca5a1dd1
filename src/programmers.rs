//! Programmer registration and dispatch
//!
//! Programmers are selected with a string of the form
//! `name[:key=value,...]`, for example `stlinkv3:spispeed=8000`.

use bridgeflash_core::programmer::SpiMaster;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "stlinkv3")]
    programmers.push(ProgrammerInfo {
        name: "stlinkv3",
        aliases: &["stlinkv3_spi"],
        description: "STLINK-V3 bridge SPI (VID:0483 PID:374F) (serial=<sn>,spispeed=<kHz>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }

    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the canonical programmer name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parsed programmer parameters
#[derive(Debug, PartialEq, Eq)]
pub struct ProgrammerParams {
    /// Programmer name as given
    pub name: String,
    /// Key-value parameters, in command line order
    pub params: Vec<(String, String)>,
}

impl ProgrammerParams {
    /// Borrow the parameters in the form programmer crates expect
    pub fn as_options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a programmer string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_programmer_params(s: &str) -> Result<ProgrammerParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name.is_empty() {
        return Err("Missing programmer name".into());
    }

    let mut params = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.push((key.trim().to_string(), value.trim().to_string()));
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(ProgrammerParams {
        name: name.to_string(),
        params,
    })
}

/// An opened programmer
pub enum Programmer {
    /// STLINK-V3 bridge session
    #[cfg(feature = "stlinkv3")]
    StLinkV3(bridgeflash_stlinkv3::StLinkV3),
}

impl Programmer {
    /// Access the programmer as a SPI master
    pub fn as_spi_mut(&mut self) -> &mut dyn SpiMaster {
        match *self {
            #[cfg(feature = "stlinkv3")]
            Programmer::StLinkV3(ref mut p) => p,
        }
    }

    /// Print programmer-specific details
    pub fn print_info(&self) {
        match *self {
            #[cfg(feature = "stlinkv3")]
            Programmer::StLinkV3(ref p) => {
                let version = p.version();
                let clock = p.clock();
                println!("Programmer: STLINK-V{}", version.stlink);
                println!("  USB ID:          {:04X}:{:04X}", version.vid, version.pid);
                println!("  JTAG/SWD FW:     {}", version.jtag);
                println!("  Bridge FW:       {}", version.bridge);
                println!("  Bridge clock:    {} kHz", clock.bridge_clock_khz);
                println!(
                    "  SCK:             {} kHz (/{})",
                    clock.sck_khz,
                    clock.prescaler.divisor()
                );
            }
        }
    }

    /// Release the programmer, reporting shutdown problems through the log
    pub fn close(self) {
        match self {
            #[cfg(feature = "stlinkv3")]
            Programmer::StLinkV3(p) => p.close(),
        }
    }
}

/// Open a programmer from its command line description
pub fn open_programmer(programmer: &str) -> Result<Programmer, Box<dyn std::error::Error>> {
    let params = parse_programmer_params(programmer)?;
    #[allow(unused_variables)]
    let options = params.as_options();

    match find_programmer(&params.name) {
        #[cfg(feature = "stlinkv3")]
        Some("stlinkv3") => {
            let config = bridgeflash_stlinkv3::parse_options(&options)?;
            let stlink = bridgeflash_stlinkv3::StLinkV3::open_with_config(&config)?;
            Ok(Programmer::StLinkV3(stlink))
        }
        _ => Err(format!(
            "Unknown programmer: {}\n{}",
            params.name,
            programmer_help()
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let params = parse_programmer_params("stlinkv3").unwrap();
        assert_eq!(params.name, "stlinkv3");
        assert!(params.params.is_empty());
    }

    #[test]
    fn test_parse_with_options() {
        let params = parse_programmer_params("stlinkv3:serial=ABC123,spispeed=4000").unwrap();
        assert_eq!(params.name, "stlinkv3");
        assert_eq!(
            params.as_options(),
            vec![("serial", "ABC123"), ("spispeed", "4000")]
        );
    }

    #[test]
    fn test_parse_rejects_bare_word() {
        assert!(parse_programmer_params("stlinkv3:spispeed").is_err());
        assert!(parse_programmer_params(":spispeed=1").is_err());
    }

    #[cfg(feature = "stlinkv3")]
    #[test]
    fn test_find_alias() {
        assert_eq!(find_programmer("stlinkv3_spi"), Some("stlinkv3"));
        assert_eq!(find_programmer("ch341a"), None);
    }

    #[cfg(feature = "stlinkv3")]
    #[test]
    fn test_bad_option_fails_before_open() {
        // Rejected while parsing, so no USB device is needed
        assert!(open_programmer("stlinkv3:spispeed=fast").is_err());
        assert!(open_programmer("stlinkv3:foo=bar").is_err());
    }
}

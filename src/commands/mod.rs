//! Command implementations

pub mod erase;
pub mod info;
pub mod probe;
pub mod read;
pub mod write;

use crate::programmers;

/// Shared progress bar style for byte-oriented operations
pub(crate) fn byte_progress(total: u64, phase: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(total);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// List all supported programmers
pub fn list_programmers() {
    print!("{}", programmers::programmer_help());
}

//! Flash command sequences built on [`SpiMaster`](crate::programmer::SpiMaster)

pub mod spi25;

pub use spi25::*;

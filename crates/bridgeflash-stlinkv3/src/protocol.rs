//! STLINK-V3 bridge protocol constants and frame structures
//!
//! Every request is a 16-byte command frame. Byte 0 selects the command
//! class (0xFB for probe-wide queries, 0xFC for the bridge), byte 1 the
//! sub-command, and the remaining bytes carry parameters, zero padded.
//! Each command is answered by a fixed-size response on the IN endpoint.

use std::time::Duration;

// ===========================================================================
// USB Device Identifiers
// ===========================================================================

/// STMicroelectronics USB Vendor ID
pub const STLINK_VID: u16 = 0x0483;

/// STLINK-V3 USB Product ID
pub const STLINK_V3_PID: u16 = 0x374F;

/// Bulk OUT endpoint of the bridge interface
pub const EP_OUT: u8 = 0x06;

/// Bulk IN endpoint of the bridge interface
pub const EP_IN: u8 = 0x86;

/// Timeout applied to every bulk transfer
pub const USB_TIMEOUT: Duration = Duration::from_millis(5000);

// ===========================================================================
// Frame layout
// ===========================================================================

/// Size of every command frame
pub const CMD_SIZE: usize = 16;

/// Payload bytes carried inside the write frame itself
pub const WRITE_INLINE_MAX: usize = 8;

/// Largest read or write the 16-bit length field can describe
pub const MAX_TRANSFER_LEN: usize = u16::MAX as usize;

/// Oldest bridge firmware with a working SPI bridge
pub const MIN_BRIDGE_VERSION: u8 = 3;

/// SCK frequency used when none is requested
pub const DEFAULT_SPISPEED_KHZ: u16 = 1000;

/// Firmware updater for STLINK probes
pub const FIRMWARE_UPDATE_URL: &str = "https://www.st.com/en/development-tools/stsw-link007.html";

/// Probe-wide command class
pub const STLINK_GET_VERSION_EXT: u8 = 0xFB;
/// Bridge command class
pub const STLINK_BRIDGE_COMMAND: u8 = 0xFC;

/// Extended version query (class 0xFB)
pub const GET_VERSION_EXT_SUB: u8 = 0x80;

/// Bridge sub-commands (class 0xFC)
pub mod bridge_cmd {
    /// Close a bridge function
    pub const CLOSE: u8 = 0x01;
    /// Read the status of the last read/write
    pub const GET_RWCMD_STATUS: u8 = 0x02;
    /// Read the input clock of a bridge function
    pub const GET_CLOCK: u8 = 0x03;
    /// Initialise the SPI master
    pub const INIT_SPI: u8 = 0x20;
    /// Write on SPI
    pub const WRITE_SPI: u8 = 0x21;
    /// Read on SPI
    pub const READ_SPI: u8 = 0x22;
    /// Drive the software NSS pin
    pub const CS_SPI: u8 = 0x23;
}

/// Bridge function selector for SPI
pub const COM_SPI: u8 = 0x02;

// ===========================================================================
// SPI init parameters
// ===========================================================================

/// SPI data direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Direction {
    /// 2 lines, full duplex
    #[default]
    FullDuplex = 0,
    /// 2 lines, receive only
    RxOnly = 1,
    /// 1 line, receive
    OneLineRx = 2,
    /// 1 line, transmit
    OneLineTx = 3,
}

/// SPI role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// Bridge is a slave
    Slave = 0,
    /// Bridge drives the clock
    #[default]
    Master = 1,
}

/// Edge on which data is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClockPhase {
    /// First clock edge (CPHA = 0)
    #[default]
    FirstEdge = 0,
    /// Second clock edge (CPHA = 1)
    SecondEdge = 1,
}

/// Idle level of SCK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ClockPolarity {
    /// Idle low (CPOL = 0)
    #[default]
    Low = 0,
    /// Idle high (CPOL = 1)
    High = 1,
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FirstBit {
    /// Least significant bit first
    Lsb = 0,
    /// Most significant bit first
    #[default]
    Msb = 1,
}

/// SPI word size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DataSize {
    /// 16-bit words
    Bits16 = 0,
    /// 8-bit words
    #[default]
    Bits8 = 1,
}

/// Who drives NSS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum NssMode {
    /// Host controls NSS with explicit commands
    #[default]
    Soft = 0,
    /// SPI peripheral drives NSS
    Hard = 1,
}

/// Level of the software NSS pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NssLevel {
    /// Chip selected
    Low = 0,
    /// Chip deselected
    High = 1,
}

/// SCK prescaler applied to the bridge input clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    /// Bridge clock / 2
    Div2 = 0,
    /// Bridge clock / 4
    Div4 = 1,
    /// Bridge clock / 8
    Div8 = 2,
    /// Bridge clock / 16
    Div16 = 3,
    /// Bridge clock / 32
    Div32 = 4,
    /// Bridge clock / 64
    Div64 = 5,
    /// Bridge clock / 128
    Div128 = 6,
    /// Bridge clock / 256
    Div256 = 7,
}

impl Prescaler {
    /// All prescalers, fastest first
    pub const ALL: [Prescaler; 8] = [
        Prescaler::Div2,
        Prescaler::Div4,
        Prescaler::Div8,
        Prescaler::Div16,
        Prescaler::Div32,
        Prescaler::Div64,
        Prescaler::Div128,
        Prescaler::Div256,
    ];

    /// Division factor
    pub const fn divisor(self) -> u32 {
        2 << (self as u8)
    }

    /// Code sent in the init frame
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Smallest prescaler whose divisor is at least `ratio`
    ///
    /// Returns `None` when even ÷256 is below `ratio`.
    pub fn for_ratio(ratio: u32) -> Option<Prescaler> {
        Self::ALL.into_iter().find(|p| p.divisor() >= ratio)
    }
}

/// Parameters of the INIT_SPI command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiInit {
    /// Data direction
    pub direction: Direction,
    /// Master or slave
    pub mode: Mode,
    /// Clock phase
    pub cpha: ClockPhase,
    /// Clock polarity
    pub cpol: ClockPolarity,
    /// Bit order
    pub first_bit: FirstBit,
    /// Word size
    pub data_size: DataSize,
    /// NSS handling
    pub nss: NssMode,
    /// SCK prescaler
    pub prescaler: Prescaler,
}

impl SpiInit {
    /// SPI NOR settings: full-duplex master, mode 0, MSB first, 8-bit, soft NSS
    pub fn flash(prescaler: Prescaler) -> Self {
        Self {
            direction: Direction::default(),
            mode: Mode::default(),
            cpha: ClockPhase::default(),
            cpol: ClockPolarity::default(),
            first_bit: FirstBit::default(),
            data_size: DataSize::default(),
            nss: NssMode::default(),
            prescaler,
        }
    }

    /// Byte 3 of the init frame packs mode, phase, polarity and bit order
    fn mode_byte(&self) -> u8 {
        (self.mode as u8)
            | (self.cpha as u8) << 1
            | (self.cpol as u8) << 2
            | (self.first_bit as u8) << 3
    }
}

// ===========================================================================
// Command frames
// ===========================================================================

/// A command frame sent on the OUT endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Probe and bridge firmware versions
    GetVersionExt,
    /// Input clock of the SPI bridge
    GetClock,
    /// Configure the SPI master
    InitSpi(SpiInit),
    /// Start a write of `len` bytes, the first ones carried in `inline`
    WriteSpi {
        /// Total write length
        len: u16,
        /// At most 8 leading payload bytes
        inline: &'a [u8],
    },
    /// Start a read of `len` bytes
    ReadSpi {
        /// Number of bytes to clock in
        len: u16,
    },
    /// Drive NSS
    SetNss(NssLevel),
    /// Status of the last read/write
    GetRwStatus,
    /// Close the SPI bridge function
    Close,
}

impl Command<'_> {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetVersionExt => "get version",
            Command::GetClock => "get clock",
            Command::InitSpi(_) => "init SPI",
            Command::WriteSpi { .. } => "write SPI",
            Command::ReadSpi { .. } => "read SPI",
            Command::SetNss(_) => "set NSS",
            Command::GetRwStatus => "get R/W status",
            Command::Close => "close SPI",
        }
    }

    /// Encode into a zero-padded 16-byte frame
    ///
    /// `WriteSpi` keeps at most [`WRITE_INLINE_MAX`] bytes of `inline`.
    pub fn encode(&self) -> [u8; CMD_SIZE] {
        let mut frame = [0u8; CMD_SIZE];
        frame[0] = STLINK_BRIDGE_COMMAND;

        match *self {
            Command::GetVersionExt => {
                frame[0] = STLINK_GET_VERSION_EXT;
                frame[1] = GET_VERSION_EXT_SUB;
            }
            Command::GetClock => {
                frame[1] = bridge_cmd::GET_CLOCK;
                frame[2] = COM_SPI;
            }
            Command::InitSpi(init) => {
                frame[1] = bridge_cmd::INIT_SPI;
                frame[2] = init.direction as u8;
                frame[3] = init.mode_byte();
                frame[4] = init.data_size as u8;
                frame[5] = init.nss as u8;
                frame[6] = init.prescaler.code();
            }
            Command::WriteSpi { len, inline } => {
                frame[1] = bridge_cmd::WRITE_SPI;
                frame[2..4].copy_from_slice(&len.to_le_bytes());
                let n = inline.len().min(WRITE_INLINE_MAX);
                frame[4..4 + n].copy_from_slice(&inline[..n]);
            }
            Command::ReadSpi { len } => {
                frame[1] = bridge_cmd::READ_SPI;
                frame[2..4].copy_from_slice(&len.to_le_bytes());
            }
            Command::SetNss(level) => {
                frame[1] = bridge_cmd::CS_SPI;
                frame[2] = level as u8;
            }
            Command::GetRwStatus => {
                frame[1] = bridge_cmd::GET_RWCMD_STATUS;
            }
            Command::Close => {
                frame[1] = bridge_cmd::CLOSE;
                frame[2] = COM_SPI;
            }
        }

        frame
    }
}

// ===========================================================================
// Responses
// ===========================================================================

/// Fixed-size answer to a command
pub trait Response: Sized {
    /// Exact number of bytes the bridge returns
    const LEN: usize;

    /// Decode from exactly [`Self::LEN`] bytes
    ///
    /// # Panics
    ///
    /// May panic if `buf` is shorter than [`Self::LEN`]. Callers receive the
    /// answer into a `LEN`-byte buffer and check its length first.
    fn decode(buf: &[u8]) -> Self;
}

/// Two-byte acknowledgement; the bridge reports failures through the R/W status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

impl Response for Ack {
    const LEN: usize = 2;

    fn decode(_buf: &[u8]) -> Self {
        Ack
    }
}

/// Answer to the extended version query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// STLINK hardware generation
    pub stlink: u8,
    /// SWIM firmware version
    pub swim: u8,
    /// JTAG/SWD firmware version
    pub jtag: u8,
    /// Mass storage / VCP firmware version
    pub msc: u8,
    /// Bridge firmware version
    pub bridge: u8,
    /// USB vendor ID reported by the probe
    pub vid: u16,
    /// USB product ID reported by the probe
    pub pid: u16,
}

impl Response for VersionInfo {
    const LEN: usize = 12;

    fn decode(buf: &[u8]) -> Self {
        Self {
            stlink: buf[0],
            swim: buf[1],
            jtag: buf[2],
            msc: buf[3],
            bridge: buf[4],
            vid: u16::from_le_bytes([buf[8], buf[9]]),
            pid: u16::from_le_bytes([buf[10], buf[11]]),
        }
    }
}

/// Answer to GET_CLOCK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeClock {
    /// Bridge input clock in kHz
    pub khz: u32,
}

impl Response for BridgeClock {
    const LEN: usize = 12;

    fn decode(buf: &[u8]) -> Self {
        Self {
            khz: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

/// Answer to GET_RWCMD_STATUS: four little-endian 16-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RwStatus {
    /// Raw words
    pub words: [u16; 4],
}

impl RwStatus {
    /// Combined status, zero on success
    pub fn status(&self) -> u32 {
        self.words[2] as u32 | (self.words[3] as u32) << 16
    }
}

impl Response for RwStatus {
    const LEN: usize = 8;

    fn decode(buf: &[u8]) -> Self {
        let mut words = [0u16; 4];
        for (word, bytes) in words.iter_mut().zip(buf.chunks_exact(2)) {
            *word = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Self { words }
    }
}

// ===========================================================================
// Clock negotiation
// ===========================================================================

/// Negotiated SCK settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Bridge input clock in kHz
    pub bridge_clock_khz: u32,
    /// Selected prescaler
    pub prescaler: Prescaler,
    /// Resulting SCK frequency in kHz
    pub sck_khz: u32,
}

impl ClockConfig {
    /// Pick the prescaler for `requested_khz` given the bridge input clock
    ///
    /// The ratio is computed with integer division and the smallest divisor
    /// not below it is used. Ratios above 256 fall back to ÷256.
    pub fn negotiate(bridge_clock_khz: u32, requested_khz: u16) -> Self {
        let ratio = bridge_clock_khz
            .checked_div(requested_khz as u32)
            .unwrap_or(u32::MAX);
        let prescaler = Prescaler::for_ratio(ratio).unwrap_or(Prescaler::Div256);

        Self {
            bridge_clock_khz,
            prescaler,
            sck_khz: bridge_clock_khz / prescaler.divisor(),
        }
    }

    /// True when the bridge clock is too fast to reach the request even at ÷256
    pub fn is_clamped(&self, requested_khz: u16) -> bool {
        self.prescaler == Prescaler::Div256 && self.sck_khz > requested_khz as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prescaler_divisors() {
        let divisors: Vec<u32> = Prescaler::ALL.iter().map(|p| p.divisor()).collect();
        assert_eq!(divisors, vec![2, 4, 8, 16, 32, 64, 128, 256]);
        let codes: Vec<u8> = Prescaler::ALL.iter().map(|p| p.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_prescaler_for_ratio() {
        assert_eq!(Prescaler::for_ratio(0), Some(Prescaler::Div2));
        assert_eq!(Prescaler::for_ratio(2), Some(Prescaler::Div2));
        assert_eq!(Prescaler::for_ratio(3), Some(Prescaler::Div4));
        assert_eq!(Prescaler::for_ratio(48), Some(Prescaler::Div64));
        assert_eq!(Prescaler::for_ratio(256), Some(Prescaler::Div256));
        assert_eq!(Prescaler::for_ratio(257), None);
    }

    #[test]
    fn test_negotiate_1mhz() {
        let clock = ClockConfig::negotiate(48_000, 1000);
        assert_eq!(clock.prescaler, Prescaler::Div64);
        assert_eq!(clock.sck_khz, 750);
        assert!(!clock.is_clamped(1000));
    }

    #[test]
    fn test_negotiate_fastest() {
        let clock = ClockConfig::negotiate(48_000, 24_000);
        assert_eq!(clock.prescaler, Prescaler::Div2);
        assert_eq!(clock.sck_khz, 24_000);

        // Faster than the bridge can go still uses /2
        let clock = ClockConfig::negotiate(48_000, 60_000);
        assert_eq!(clock.prescaler, Prescaler::Div2);
        assert_eq!(clock.sck_khz, 24_000);
    }

    #[test]
    fn test_negotiate_clamps_to_slowest() {
        let clock = ClockConfig::negotiate(192_000, 100);
        assert_eq!(clock.prescaler, Prescaler::Div256);
        assert_eq!(clock.sck_khz, 750);
        assert!(clock.is_clamped(100));
    }

    #[test]
    fn test_negotiate_never_exceeds_exact_ratios() {
        for &bridge in &[24_000u32, 48_000, 64_000, 192_000] {
            for requested in [100u16, 375, 750, 1000, 3000, 8000, 12_000, 24_000] {
                let clock = ClockConfig::negotiate(bridge, requested);
                if bridge % requested as u32 == 0 && !clock.is_clamped(requested) {
                    assert!(
                        clock.sck_khz <= requested as u32,
                        "{} kHz / {:?} > {} kHz",
                        bridge,
                        clock.prescaler,
                        requested
                    );
                }
            }
        }
    }

    #[test]
    fn test_encode_version_and_clock() {
        let frame = Command::GetVersionExt.encode();
        assert_eq!(&frame[..2], &[0xFB, 0x80]);
        assert!(frame[2..].iter().all(|b| *b == 0));

        let frame = Command::GetClock.encode();
        assert_eq!(&frame[..3], &[0xFC, 0x03, 0x02]);
        assert!(frame[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_init_spi() {
        let frame = Command::InitSpi(SpiInit::flash(Prescaler::Div64)).encode();
        assert_eq!(&frame[..7], &[0xFC, 0x20, 0x00, 0x09, 0x01, 0x00, 0x05]);
        assert!(frame[7..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_write_inline() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let frame = Command::WriteSpi {
            len: 0x1234,
            inline: &data,
        }
        .encode();
        assert_eq!(&frame[..4], &[0xFC, 0x21, 0x34, 0x12]);
        assert_eq!(&frame[4..12], &data[..8]);
        assert_eq!(&frame[12..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_read_nss_status_close() {
        assert_eq!(
            &Command::ReadSpi { len: 300 }.encode()[..4],
            &[0xFC, 0x22, 0x2C, 0x01]
        );
        assert_eq!(
            &Command::SetNss(NssLevel::Low).encode()[..3],
            &[0xFC, 0x23, 0x00]
        );
        assert_eq!(
            &Command::SetNss(NssLevel::High).encode()[..3],
            &[0xFC, 0x23, 0x01]
        );
        assert_eq!(&Command::GetRwStatus.encode()[..3], &[0xFC, 0x02, 0x00]);
        assert_eq!(&Command::Close.encode()[..3], &[0xFC, 0x01, 0x02]);
    }

    #[test]
    #[should_panic]
    fn test_decode_short_buffer_panics() {
        VersionInfo::decode(&[3, 0, 7, 1]);
    }

    #[test]
    fn test_decode_responses() {
        let version = VersionInfo::decode(&[3, 0, 7, 1, 3, 0, 0, 0, 0x83, 0x04, 0x4F, 0x37]);
        assert_eq!(version.stlink, 3);
        assert_eq!(version.jtag, 7);
        assert_eq!(version.bridge, 3);
        assert_eq!(version.vid, STLINK_VID);
        assert_eq!(version.pid, STLINK_V3_PID);

        let clock = BridgeClock::decode(&[0x80, 0, 0, 0, 0x80, 0xBB, 0, 0, 0, 0, 0, 0]);
        assert_eq!(clock.khz, 48_000);

        let status = RwStatus::decode(&[0x80, 0, 0, 0, 0x34, 0x12, 0x01, 0x00]);
        assert_eq!(status.status(), 0x0001_1234);
        assert_eq!(RwStatus::decode(&[0x80, 0, 0xFF, 0xFF, 0, 0, 0, 0]).status(), 0);
    }
}

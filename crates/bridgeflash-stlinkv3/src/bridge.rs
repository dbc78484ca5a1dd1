//! Command layer over a bridge transport
//!
//! [`Bridge`] turns typed commands into frames, enforces the exact transfer
//! lengths the firmware uses and decodes answers. It holds no session
//! state; [`StLinkV3`](crate::StLinkV3) builds the session on top of it.

use std::ops::{Deref, DerefMut};

use crate::error::{Result, StLinkV3Error};
use crate::protocol::{
    Ack, BridgeClock, ClockConfig, Command, NssLevel, Response, RwStatus, SpiInit, VersionInfo,
    CMD_SIZE, FIRMWARE_UPDATE_URL, MAX_TRANSFER_LEN, MIN_BRIDGE_VERSION, WRITE_INLINE_MAX,
};
use crate::transport::Transport;

/// Typed access to the bridge commands
pub struct Bridge<T: Transport> {
    transport: T,
}

impl<T: Transport> Bridge<T> {
    /// Wrap an open transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send one 16-byte command frame
    pub fn send_frame(&mut self, cmd: &Command<'_>) -> Result<()> {
        let frame = cmd.encode();
        log::debug!("Sending {} frame: {:02X?}", cmd.name(), frame);

        let sent = self.transport.bulk_out(&frame).inspect_err(|e| {
            log::error!("Failed to issue the {} command: {}", cmd.name(), e);
        })?;
        if sent != CMD_SIZE {
            return Err(StLinkV3Error::ShortTransfer {
                what: cmd.name(),
                expected: CMD_SIZE,
                actual: sent,
            });
        }
        Ok(())
    }

    /// Send raw bytes that follow a frame
    pub fn send_raw(&mut self, what: &'static str, data: &[u8]) -> Result<()> {
        let sent = self.transport.bulk_out(data).inspect_err(|e| {
            log::error!("Failed to send {}: {}", what, e);
        })?;
        if sent != data.len() {
            return Err(StLinkV3Error::ShortTransfer {
                what,
                expected: data.len(),
                actual: sent,
            });
        }
        Ok(())
    }

    /// Fill `buf` from the IN endpoint; anything but exactly `buf.len()` bytes fails
    pub fn receive(&mut self, what: &'static str, buf: &mut [u8]) -> Result<()> {
        let received = self.transport.bulk_in(buf).inspect_err(|e| {
            log::error!("Failed to receive the {} answer: {}", what, e);
        })?;
        if received != buf.len() {
            return Err(StLinkV3Error::ShortTransfer {
                what,
                expected: buf.len(),
                actual: received,
            });
        }
        Ok(())
    }

    /// Send `cmd` and decode its fixed-size answer
    pub fn query<R: Response>(&mut self, cmd: Command<'_>) -> Result<R> {
        self.send_frame(&cmd)?;
        let mut buf = [0u8; CMD_SIZE];
        self.receive(cmd.name(), &mut buf[..R::LEN])?;
        Ok(R::decode(&buf[..R::LEN]))
    }

    /// Read the probe and bridge firmware versions
    pub fn version(&mut self) -> Result<VersionInfo> {
        self.query(Command::GetVersionExt)
    }

    /// Fail unless the bridge firmware is recent enough for SPI
    pub fn check_version(&mut self) -> Result<VersionInfo> {
        let version = self.version()?;
        log::info!(
            "Connected to STLINK-V3 with bridge FW version: {}",
            version.bridge
        );

        if version.bridge < MIN_BRIDGE_VERSION {
            log::error!(
                "The STLINK-V3 bridge firmware is too old (version {}, need {} or newer). \
                 Update it with STSW-LINK007: {}",
                version.bridge,
                MIN_BRIDGE_VERSION,
                FIRMWARE_UPDATE_URL
            );
            return Err(StLinkV3Error::FirmwareTooOld {
                found: version.bridge,
                required: MIN_BRIDGE_VERSION,
            });
        }

        Ok(version)
    }

    /// Input clock of the SPI bridge in kHz
    pub fn bridge_clock(&mut self) -> Result<u32> {
        let clock: BridgeClock = self.query(Command::GetClock)?;
        log::debug!("Bridge SPI input clock: {} kHz", clock.khz);
        Ok(clock.khz)
    }

    /// Query the bridge clock and pick the prescaler for `requested_khz`
    pub fn calc_prescaler(&mut self, requested_khz: u16) -> Result<ClockConfig> {
        if requested_khz == 0 {
            return Err(StLinkV3Error::ConfigError(
                "SPI speed must be at least 1 kHz".to_string(),
            ));
        }

        let bridge_clock_khz = self.bridge_clock()?;
        let clock = ClockConfig::negotiate(bridge_clock_khz, requested_khz);

        if clock.is_clamped(requested_khz) {
            log::warn!(
                "Requested {} kHz is below the slowest SCK ({} kHz / 256), using {} kHz",
                requested_khz,
                bridge_clock_khz,
                clock.sck_khz
            );
        } else if clock.sck_khz > requested_khz as u32 {
            log::warn!(
                "SCK {} kHz is above the requested {} kHz ({} kHz / {})",
                clock.sck_khz,
                requested_khz,
                bridge_clock_khz,
                clock.prescaler.divisor()
            );
        }

        Ok(clock)
    }

    /// Configure the SPI master
    pub fn init_spi(&mut self, init: SpiInit) -> Result<()> {
        self.query::<Ack>(Command::InitSpi(init))?;
        Ok(())
    }

    /// Drive the software NSS pin
    pub fn set_nss(&mut self, level: NssLevel) -> Result<()> {
        self.query::<Ack>(Command::SetNss(level)).inspect_err(|_| {
            log::error!("Failed to set the NSS pin to {:?}", level);
        })?;
        Ok(())
    }

    /// Status of the last SPI read or write, zero on success
    pub fn last_rw_status(&mut self) -> Result<u32> {
        let status: RwStatus = self.query(Command::GetRwStatus)?;
        Ok(status.status())
    }

    /// Poll the status and turn a nonzero value into an error
    pub fn check_rw_status(&mut self) -> Result<()> {
        match self.last_rw_status()? {
            0 => Ok(()),
            status => {
                log::error!("SPI read/write failure: {}", status);
                Err(StLinkV3Error::SpiStatus(status))
            }
        }
    }

    /// Clock out `data`
    ///
    /// The first 8 bytes ride in the write frame, the rest follows as a raw
    /// bulk transfer.
    pub fn write_spi(&mut self, data: &[u8]) -> Result<()> {
        let len = u16::try_from(data.len())
            .map_err(|_| StLinkV3Error::TransferTooLong(data.len()))?;
        let inline = data.len().min(WRITE_INLINE_MAX);

        self.send_frame(&Command::WriteSpi {
            len,
            inline: &data[..inline],
        })?;

        if data.len() > WRITE_INLINE_MAX {
            self.send_raw("write SPI data", &data[WRITE_INLINE_MAX..])?;
        }
        Ok(())
    }

    /// Clock in `buf.len()` bytes
    pub fn read_spi(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > MAX_TRANSFER_LEN {
            return Err(StLinkV3Error::TransferTooLong(buf.len()));
        }
        let cmd = Command::ReadSpi {
            len: buf.len() as u16,
        };
        self.send_frame(&cmd)?;
        self.receive(cmd.name(), buf)
    }

    /// Close the SPI bridge function
    pub fn close_bridge(&mut self) -> Result<()> {
        self.query::<Ack>(Command::Close)?;
        Ok(())
    }
}

/// NSS held low for the lifetime of the guard
///
/// Created by [`NssGuard::select`]; dropping it drives NSS high again and
/// only logs if that fails. [`NssGuard::release`] does the same but hands
/// the error back.
pub struct NssGuard<'a, T: Transport> {
    bridge: &'a mut Bridge<T>,
    armed: bool,
}

impl<'a, T: Transport> NssGuard<'a, T> {
    /// Drive NSS low
    ///
    /// If this fails no guard exists and nothing is undone.
    pub fn select(bridge: &'a mut Bridge<T>) -> Result<Self> {
        bridge.set_nss(NssLevel::Low)?;
        Ok(Self {
            bridge,
            armed: true,
        })
    }

    /// Drive NSS high and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.bridge.set_nss(NssLevel::High)
    }
}

impl<T: Transport> Deref for NssGuard<'_, T> {
    type Target = Bridge<T>;

    fn deref(&self) -> &Bridge<T> {
        self.bridge
    }
}

impl<T: Transport> DerefMut for NssGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Bridge<T> {
        self.bridge
    }
}

impl<T: Transport> Drop for NssGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.bridge.set_nss(NssLevel::High) {
                log::error!("Failed to set the NSS pin to high: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockState, MockTransport};
    use crate::protocol::{bridge_cmd, Prescaler, GET_VERSION_EXT_SUB};

    #[test]
    fn test_check_version_accepts_3() {
        let (transport, state) = MockTransport::new();
        let mut bridge = Bridge::new(transport);

        let version = bridge.check_version().unwrap();
        assert_eq!(version.bridge, 3);
        assert_eq!(state.borrow().subs(), vec![GET_VERSION_EXT_SUB]);
    }

    #[test]
    fn test_check_version_rejects_2() {
        let (transport, _state) = MockTransport::with_state(MockState {
            bridge_version: 2,
            ..MockState::default()
        });
        let mut bridge = Bridge::new(transport);

        assert!(matches!(
            bridge.check_version(),
            Err(StLinkV3Error::FirmwareTooOld {
                found: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn test_short_answer_is_an_error() {
        let (transport, _state) = MockTransport::with_state(MockState {
            short_reply: Some((bridge_cmd::GET_CLOCK, 1)),
            ..MockState::default()
        });
        let mut bridge = Bridge::new(transport);

        match bridge.bridge_clock() {
            Err(StLinkV3Error::ShortTransfer {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 11);
            }
            other => panic!("expected short transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_answer_times_out() {
        let (transport, _state) = MockTransport::with_state(MockState {
            drop_reply: Some((bridge_cmd::CS_SPI, 1)),
            ..MockState::default()
        });
        let mut bridge = Bridge::new(transport);

        assert!(matches!(
            bridge.set_nss(NssLevel::Low),
            Err(StLinkV3Error::Timeout)
        ));
    }

    #[test]
    fn test_calc_prescaler() {
        let (transport, _state) = MockTransport::new();
        let mut bridge = Bridge::new(transport);

        let clock = bridge.calc_prescaler(1000).unwrap();
        assert_eq!(clock.bridge_clock_khz, 48_000);
        assert_eq!(clock.prescaler, Prescaler::Div64);
        assert_eq!(clock.sck_khz, 750);
    }

    #[test]
    fn test_calc_prescaler_zero_does_no_io() {
        let (transport, state) = MockTransport::new();
        let mut bridge = Bridge::new(transport);

        assert!(matches!(
            bridge.calc_prescaler(0),
            Err(StLinkV3Error::ConfigError(_))
        ));
        assert!(state.borrow().frames.is_empty());
    }

    #[test]
    fn test_rw_status_nonzero() {
        let (transport, state) = MockTransport::new();
        state.borrow_mut().statuses.extend([0, 0x0002_0001]);
        let mut bridge = Bridge::new(transport);

        assert_eq!(bridge.last_rw_status().unwrap(), 0);
        assert!(matches!(
            bridge.check_rw_status(),
            Err(StLinkV3Error::SpiStatus(0x0002_0001))
        ));
    }

    #[test]
    fn test_write_spi_rejects_oversize() {
        let (transport, state) = MockTransport::new();
        let mut bridge = Bridge::new(transport);

        let data = vec![0u8; 65536];
        assert!(matches!(
            bridge.write_spi(&data),
            Err(StLinkV3Error::TransferTooLong(65536))
        ));
        assert!(state.borrow().frames.is_empty());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let (transport, state) = MockTransport::new();
        let mut bridge = Bridge::new(transport);

        {
            let _cs = NssGuard::select(&mut bridge).unwrap();
            assert_eq!(state.borrow().nss, NssLevel::Low);
        }
        assert_eq!(state.borrow().nss, NssLevel::High);
        assert_eq!(
            state.borrow().nss_history,
            vec![NssLevel::Low, NssLevel::High]
        );
    }

    #[test]
    fn test_guard_release_reports_failure() {
        let (transport, state) = MockTransport::with_state(MockState {
            fail_frame: Some((bridge_cmd::CS_SPI, 2)),
            ..MockState::default()
        });
        let mut bridge = Bridge::new(transport);

        let cs = NssGuard::select(&mut bridge).unwrap();
        assert!(cs.release().is_err());
        // No second attempt after an explicit release
        assert_eq!(state.borrow().count(bridge_cmd::CS_SPI), 2);
    }
}

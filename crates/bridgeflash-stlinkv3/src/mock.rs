//! Scripted STLINK-V3 bridge for unit tests
//!
//! `MockTransport` decodes every frame the host sends and answers the way
//! the bridge firmware does. The shared `MockState` lets a test script the
//! device (firmware version, clock, statuses, read data, failures) and
//! inspect what was sent after the session is gone.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::error::{Result, StLinkV3Error};
use crate::protocol::{
    bridge_cmd, NssLevel, CMD_SIZE, GET_VERSION_EXT_SUB, STLINK_BRIDGE_COMMAND,
    STLINK_GET_VERSION_EXT, STLINK_V3_PID, STLINK_VID, WRITE_INLINE_MAX,
};
use crate::transport::Transport;

/// Which reply or transfer to tamper with: (sub-command, 1-based occurrence)
pub type Trigger = (u8, usize);

pub struct MockState {
    pub bridge_version: u8,
    pub clock_khz: u32,
    /// Statuses returned by successive GET_RWCMD_STATUS, 0 once exhausted
    pub statuses: VecDeque<u32>,
    /// Bytes handed out by READ_SPI, 0xFF once exhausted
    pub read_data: VecDeque<u8>,

    /// OUT frame whose transfer fails
    pub fail_frame: Option<Trigger>,
    /// Answer to this command comes back one byte short
    pub short_reply: Option<Trigger>,
    /// Answer to this command never arrives
    pub drop_reply: Option<Trigger>,
    /// Continuation after WRITE_SPI fails
    pub fail_raw: bool,

    pub nss: NssLevel,
    pub nss_history: Vec<NssLevel>,
    pub frames: Vec<[u8; CMD_SIZE]>,
    pub written: Vec<u8>,
    pub init_frame: Option<[u8; CMD_SIZE]>,
    pub closed: bool,

    /// Frames seen per sub-command
    pub counts: HashMap<u8, usize>,
    /// Length of the raw continuation expected after WRITE_SPI
    pub expect_raw: Option<usize>,
    /// Answers queued for the next IN transfers
    pub pending: VecDeque<Vec<u8>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            bridge_version: 3,
            clock_khz: 48_000,
            statuses: VecDeque::new(),
            read_data: VecDeque::new(),
            fail_frame: None,
            short_reply: None,
            drop_reply: None,
            fail_raw: false,
            nss: NssLevel::High,
            nss_history: Vec::new(),
            frames: Vec::new(),
            written: Vec::new(),
            init_frame: None,
            closed: false,
            counts: HashMap::new(),
            expect_raw: None,
            pending: VecDeque::new(),
        }
    }
}

impl MockState {
    /// Sub-commands of every frame sent so far, in order
    pub fn subs(&self) -> Vec<u8> {
        self.frames.iter().map(|f| f[1]).collect()
    }

    /// Number of frames sent with this sub-command
    pub fn count(&self, sub: u8) -> usize {
        self.counts.get(&sub).copied().unwrap_or(0)
    }

    fn handle_frame(&mut self, frame: [u8; CMD_SIZE]) -> Vec<u8> {
        match (frame[0], frame[1]) {
            (STLINK_GET_VERSION_EXT, GET_VERSION_EXT_SUB) => {
                let mut reply = vec![3, 0, 7, 1, self.bridge_version, 0, 0, 0];
                reply.extend_from_slice(&STLINK_VID.to_le_bytes());
                reply.extend_from_slice(&STLINK_V3_PID.to_le_bytes());
                reply
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::GET_CLOCK) => {
                let mut reply = vec![0x80, 0, 0, 0];
                reply.extend_from_slice(&self.clock_khz.to_le_bytes());
                reply.extend_from_slice(&[0; 4]);
                reply
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::INIT_SPI) => {
                self.init_frame = Some(frame);
                vec![0x80, 0]
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::CS_SPI) => {
                self.nss = if frame[2] == 0 {
                    NssLevel::Low
                } else {
                    NssLevel::High
                };
                self.nss_history.push(self.nss);
                vec![0x80, 0]
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::WRITE_SPI) => {
                let len = u16::from_le_bytes([frame[2], frame[3]]) as usize;
                let inline = len.min(WRITE_INLINE_MAX);
                self.written.extend_from_slice(&frame[4..4 + inline]);
                if len > WRITE_INLINE_MAX {
                    self.expect_raw = Some(len - WRITE_INLINE_MAX);
                }
                Vec::new()
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::READ_SPI) => {
                let len = u16::from_le_bytes([frame[2], frame[3]]) as usize;
                (0..len)
                    .map(|_| self.read_data.pop_front().unwrap_or(0xFF))
                    .collect()
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::GET_RWCMD_STATUS) => {
                let status = self.statuses.pop_front().unwrap_or(0);
                let mut reply = vec![0x80, 0, 0, 0];
                reply.extend_from_slice(&status.to_le_bytes());
                reply
            }
            (STLINK_BRIDGE_COMMAND, bridge_cmd::CLOSE) => {
                self.closed = true;
                vec![0x80, 0]
            }
            other => panic!("unexpected frame {:02X?}", other),
        }
    }
}

pub struct MockTransport {
    state: Rc<RefCell<MockState>>,
}

impl MockTransport {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> (Self, Rc<RefCell<MockState>>) {
        let state = Rc::new(RefCell::new(state));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

fn hit(trigger: Option<Trigger>, sub: u8, nth: usize) -> bool {
    trigger == Some((sub, nth))
}

impl Transport for MockTransport {
    fn bulk_out(&mut self, data: &[u8]) -> Result<usize> {
        let mut st = self.state.borrow_mut();

        if let Some(expected) = st.expect_raw.take() {
            assert_eq!(data.len(), expected, "continuation length");
            if st.fail_raw {
                return Err(StLinkV3Error::TransferFailed("injected".to_string()));
            }
            st.written.extend_from_slice(data);
            return Ok(data.len());
        }

        let frame: [u8; CMD_SIZE] = data.try_into().expect("frames are 16 bytes");
        let sub = frame[1];
        let nth = {
            let n = st.counts.entry(sub).or_insert(0);
            *n += 1;
            *n
        };

        if hit(st.fail_frame, sub, nth) {
            return Err(StLinkV3Error::TransferFailed("injected".to_string()));
        }

        st.frames.push(frame);
        let mut reply = st.handle_frame(frame);

        if sub != bridge_cmd::WRITE_SPI && !hit(st.drop_reply, sub, nth) {
            if hit(st.short_reply, sub, nth) {
                reply.pop();
            }
            st.pending.push_back(reply);
        }
        Ok(data.len())
    }

    fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut st = self.state.borrow_mut();
        let reply = st.pending.pop_front().ok_or(StLinkV3Error::Timeout)?;
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(reply.len())
    }
}

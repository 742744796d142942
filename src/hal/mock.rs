//! Mock transport for testing without a serial port.
//!
//! [`MockTransport`] records every byte written to it and can be scripted to
//! fail. Clones share the same recording, so a test can keep one clone as a
//! view of the wire after moving the other into a
//! [`CommandDispatcher`](crate::CommandDispatcher).
//!
//! # Example
//!
//! ```rust
//! use rs_trainz_base::{Address, Command, CommandDispatcher, Target, TargetType};
//! use rs_trainz_base::hal::MockTransport;
//!
//! let transport = MockTransport::new();
//! let wire = transport.clone();
//!
//! let target = Target::new(Address::new(23), TargetType::Train);
//! let dispatcher = CommandDispatcher::new(target, transport);
//! dispatcher.dispatch(Command::AbsoluteSpeed, 5).unwrap();
//!
//! assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0xE5]]);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::frame::FRAME_LEN;
use crate::traits::{check_written, Transport, TransportError};

#[derive(Debug, Default)]
struct MockState {
    bytes: Vec<u8>,
    send_calls: usize,
    failed_sends: usize,
    fail_all: bool,
    fail_next: usize,
    write_limit: Option<usize>,
    closed: bool,
    fail_close: bool,
}

/// Recording transport for tests.
///
/// Bytes are appended one at a time with a [`thread::yield_now`] between
/// them. Two writers that are not serialized by a lock therefore produce an
/// interleaved byte log, which is what the mutual exclusion tests look for.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Creates a transport that accepts every write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail until [`recover`](Self::recover).
    pub fn fail_sends(&self) {
        self.lock().fail_all = true;
    }

    /// Make only the next `count` sends fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Accept at most `limit` bytes per write, producing short writes.
    pub fn with_write_limit(self, limit: usize) -> Self {
        self.lock().write_limit = Some(limit);
        self
    }

    /// Make [`close`](Transport::close) report an error.
    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    /// Clear any scripted send failure.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.fail_all = false;
        state.fail_next = 0;
    }

    /// All bytes written so far, in order.
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Bytes written so far, grouped into 3-byte frames.
    ///
    /// A trailing partial frame is dropped.
    pub fn frames(&self) -> Vec<[u8; FRAME_LEN]> {
        self.lock()
            .bytes
            .chunks_exact(FRAME_LEN)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    /// The most recently written frame, if any.
    pub fn last_frame(&self) -> Option<[u8; FRAME_LEN]> {
        self.frames().last().copied()
    }

    /// Number of `send` calls, successful or not.
    pub fn send_calls(&self) -> usize {
        self.lock().send_calls
    }

    /// Number of `send` calls that returned an error.
    pub fn failed_sends(&self) -> usize {
        self.lock().failed_sends
    }

    /// Whether `close` has been called successfully.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), TransportError> {
        let limit = {
            let mut state = self.lock();
            state.send_calls += 1;

            if state.closed {
                state.failed_sends += 1;
                return Err(TransportError::Closed);
            }

            if state.fail_all || state.fail_next > 0 {
                state.fail_next = state.fail_next.saturating_sub(1);
                state.failed_sends += 1;
                return Err(TransportError::Write(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "mock write timeout",
                )));
            }

            state.write_limit.unwrap_or(FRAME_LEN).min(FRAME_LEN)
        };

        // Byte-at-a-time, without holding the recording lock across bytes.
        for &byte in &frame[..limit] {
            self.lock().bytes.push(byte);
            thread::yield_now();
        }

        let result = check_written(limit);
        if result.is_err() {
            self.lock().failed_sends += 1;
        }
        result
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.fail_close {
            return Err(TransportError::Close(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock close failure",
            )));
        }
        state.closed = true;
        Ok(())
    }
}

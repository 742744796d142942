//! Transport abstraction for the link to the base.
//!
//! The protocol is open-loop: frames are written and never acknowledged, so
//! the trait has no read side.
//!
//! # Implementations
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`MockTransport`](crate::hal::MockTransport) | Records bytes for tests |
//! | `SerialTransport` | Real serial port (requires `serial` feature) |
//!
//! # Example
//!
//! ```rust
//! use rs_trainz_base::traits::Transport;
//! use rs_trainz_base::hal::MockTransport;
//!
//! let mut transport = MockTransport::new();
//! transport.send(&[0xFE, 0x0B, 0x80]).unwrap();
//! assert_eq!(transport.frames(), vec![[0xFE, 0x0B, 0x80]]);
//! ```

use std::io;

use crate::frame::FRAME_LEN;

/// Errors reported by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port could not be opened or configured.
    #[error("failed to open {port}: {source}")]
    Open {
        /// Port identifier (e.g. `COM1`, `/dev/ttyUSB0`).
        port: String,
        /// Underlying cause.
        source: io::Error,
    },

    /// The single write attempt failed.
    #[error("write error: {0}")]
    Write(#[source] io::Error),

    /// The write attempt accepted fewer bytes than a full frame.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite {
        /// Bytes accepted by the port.
        written: usize,
        /// Bytes in a frame.
        expected: usize,
    },

    /// Closing the port failed.
    #[error("close error: {0}")]
    Close(#[source] io::Error),

    /// The transport has already been closed.
    #[error("transport closed")]
    Closed,
}

/// Sends frames to the base.
///
/// # Implementation Notes
///
/// - [`send`](Self::send) must attempt the write exactly once. Retry policy
///   belongs to the caller, and the current policy is no retries.
/// - [`close`](Self::close) is best effort. Callers report a failure, they do
///   not escalate it.
/// - Opening is done by each implementation's constructor.
pub trait Transport {
    /// Write one full frame.
    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), TransportError>;

    /// Release the underlying port.
    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

/// Check that a single write accepted the whole frame.
pub(crate) fn check_written(written: usize) -> Result<(), TransportError> {
    if written == FRAME_LEN {
        Ok(())
    } else {
        Err(TransportError::ShortWrite {
            written,
            expected: FRAME_LEN,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTransport {
        sent: usize,
    }

    impl Transport for NullTransport {
        fn send(&mut self, _frame: &[u8; FRAME_LEN]) -> Result<(), TransportError> {
            self.sent += 1;
            Ok(())
        }
    }

    #[test]
    fn default_close_is_ok() {
        let mut t = NullTransport { sent: 0 };
        assert!(t.close().is_ok());
    }

    #[test]
    fn boxed_transport_forwards() {
        let mut boxed: Box<NullTransport> = Box::new(NullTransport { sent: 0 });
        boxed.send(&[0xFE, 0, 0]).unwrap();
        boxed.send(&[0xFE, 0, 0]).unwrap();
        assert_eq!(boxed.sent, 2);
    }

    #[test]
    fn short_write_detected() {
        assert!(check_written(3).is_ok());
        assert!(matches!(
            check_written(1),
            Err(TransportError::ShortWrite {
                written: 1,
                expected: 3
            })
        ));
    }

    #[test]
    fn error_messages() {
        let err = TransportError::Open {
            port: "COM1".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such port"),
        };
        assert_eq!(err.to_string(), "failed to open COM1: no such port");
        assert_eq!(TransportError::Closed.to_string(), "transport closed");
    }
}

//! Error types.
//!
//! Only [`Error::CannotOpenTransport`] is fatal. A [`Error::WriteFailed`]
//! drops one frame and the next command proceeds normally; an
//! [`Error::InvalidUserInput`] just re-prompts.

use crate::traits::TransportError;

/// Errors from building or parsing frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Address does not fit in 7 bits.
    #[error("address {0} out of range (max 127)")]
    AddressOutOfRange(u8),

    /// First byte is not the preamble.
    #[error("bad preamble byte {0:#04x}")]
    BadPreamble(u8),

    /// byte1 holds neither an address nor the halt value.
    #[error("bad address byte {0:#04x}")]
    BadAddressByte(u8),

    /// Command bits match no known command.
    #[error("unknown command bits {0:#04x}")]
    UnknownCommand(u8),
}

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport could not be opened at startup.
    #[error("cannot open transport: {0}")]
    CannotOpenTransport(#[source] TransportError),

    /// A frame could not be written. The command is dropped.
    #[error("write failed: {0}")]
    WriteFailed(#[from] TransportError),

    /// Operator input could not be understood.
    #[error("invalid input: {0}")]
    InvalidUserInput(String),

    /// Frame construction or parsing failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl Error {
    /// Returns true if the process cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CannotOpenTransport(_))
    }
}

/// Result alias using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

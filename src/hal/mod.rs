//! Transport implementations.
//!
//! This module contains concrete implementations of the
//! [`Transport`](crate::traits::Transport) trait.
//!
//! # Available Implementations
//!
//! - `mock`: Recording transport for tests and desktop development
//! - `serial`: Real serial port (requires `serial` feature)

pub mod mock;

#[cfg(feature = "serial")]
pub mod serial;

pub use mock::*;

#[cfg(feature = "serial")]
pub use serial::*;

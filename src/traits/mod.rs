//! Trait definitions for the hardware seam.
//!
//! The codec and dispatcher never touch a port directly. They go through
//! [`Transport`], so the whole crate can be tested on the desktop with
//! [`MockTransport`](crate::hal::MockTransport) and run against a real serial
//! port with `SerialTransport` (requires the `serial` feature).

pub mod transport;

pub use transport::*;

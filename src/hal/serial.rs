//! Serial port transport backed by the `serialport` crate.
//!
//! The line configuration is fixed by the base: 9600 baud, 8 data bits,
//! 1 stop bit, no parity, no flow control. The write timeout comes from
//! [`LinkConfig::timeout_ms`].
//!
//! # Example
//!
//! ```ignore
//! use rs_trainz_base::config::LinkConfig;
//! use rs_trainz_base::hal::SerialTransport;
//!
//! let link = LinkConfig::default().with_port("/dev/ttyUSB0");
//! let transport = SerialTransport::open(&link)?;
//! ```

use std::io::{self, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{info, warn};

use crate::config::LinkConfig;
use crate::frame::FRAME_LEN;
use crate::traits::{check_written, Transport, TransportError};

/// A [`Transport`] writing to a serial port.
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open and configure the port named in `link`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] if the port cannot be opened or
    /// configured.
    pub fn open(link: &LinkConfig) -> Result<Self, TransportError> {
        let name = link.port.as_str().to_string();
        info!(port = %name, baud = link.baud_rate, "opening serial port");

        let port = serialport::new(name.as_str(), link.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(u64::from(link.timeout_ms)))
            .open()
            .map_err(|e| TransportError::Open {
                port: name.clone(),
                source: io::Error::from(e),
            })?;

        Ok(Self {
            name,
            port: Some(port),
        })
    }

    /// Name of the port this transport writes to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        // One write call; a partial write is reported, not completed.
        let written = port.write(frame).map_err(TransportError::Write)?;
        check_written(written)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.port.take() {
            Some(mut port) => {
                let flushed = port.flush();
                drop(port);
                info!(port = %self.name, "serial port closed");
                flushed.map_err(|e| {
                    warn!(port = %self.name, error = %e, "flush before close failed");
                    TransportError::Close(e)
                })
            }
            None => Ok(()),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl core::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

//! Configuration for the serial link, the controlled target and the horn
//! monitor.
//!
//! Uses `heapless::String` for the port name so the config stays `Copy`-cheap
//! and fixed-size.
//!
//! # Example
//!
//! ```rust
//! use rs_trainz_base::config::{Config, HornConfig, LinkConfig, TargetConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.link.baud_rate, 9600);
//! assert_eq!(config.target.address, 23);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_link(LinkConfig::default().with_port("/dev/ttyUSB1"))
//!     .with_target(TargetConfig::default().with_address(42))
//!     .with_horn(HornConfig::default().with_threshold(8));
//! ```

use heapless::String as HString;

use crate::frame::{Address, TargetType};
use crate::target::{Target, MAX_SPEED};

/// Maximum length for short config strings (port names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Serial link to the base
    pub link: LinkConfig,
    /// The controlled train or switch
    pub target: TargetConfig,
    /// Background horn monitor
    pub horn: HornConfig,
}

impl Config {
    /// Set link configuration
    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    /// Set target configuration
    pub fn with_target(mut self, target: TargetConfig) -> Self {
        self.target = target;
        self
    }

    /// Set horn monitor configuration
    pub fn with_horn(mut self, horn: HornConfig) -> Self {
        self.horn = horn;
        self
    }
}

// ============================================================================
// Link Config
// ============================================================================

/// Default port name for the platform.
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM1";

/// Default port name for the platform.
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Serial line configuration.
///
/// Data bits, stop bits and parity are fixed by the base (8N1) and are not
/// configurable.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Port name (`COM1`, `/dev/ttyUSB0`, ...)
    pub port: ShortString,
    /// Line speed in baud
    pub baud_rate: u32,
    /// Read/write timeout in milliseconds
    pub timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: short_string(DEFAULT_PORT),
            baud_rate: 9600,
            timeout_ms: 50,
        }
    }
}

impl LinkConfig {
    /// Set the port name
    pub fn with_port(mut self, port: &str) -> Self {
        self.port = short_string(port);
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the timeout
    pub fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }
}

// ============================================================================
// Target Config
// ============================================================================

/// The target driven by this controller.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetConfig {
    /// Bus address (truncated to 7 bits when the target is built)
    pub address: u8,
    /// Train or switch
    pub kind: TargetType,
    /// Highest speed step the operator may command
    pub max_speed: u8,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: 23,
            kind: TargetType::Train,
            max_speed: MAX_SPEED,
        }
    }
}

impl TargetConfig {
    /// Set the bus address
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the target type
    pub fn with_kind(mut self, kind: TargetType) -> Self {
        self.kind = kind;
        self
    }

    /// Set the maximum speed step (capped at [`MAX_SPEED`])
    pub fn with_max_speed(mut self, max: u8) -> Self {
        self.max_speed = max.min(MAX_SPEED);
        self
    }

    /// Build the target described by this config.
    pub fn build(&self) -> Target {
        Target::new(Address::new(self.address), self.kind).with_max_speed(self.max_speed)
    }
}

// ============================================================================
// Horn Config
// ============================================================================

/// Background horn monitor configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HornConfig {
    /// Whether the monitor runs at all
    pub enabled: bool,
    /// Tick period in milliseconds
    pub period_ms: u32,
    /// Sound the horn while speed is at or above this step
    pub threshold: u8,
}

impl Default for HornConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 500,
            threshold: 5,
        }
    }
}

impl HornConfig {
    /// Enable or disable the monitor
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the tick period
    pub fn with_period_ms(mut self, ms: u32) -> Self {
        self.period_ms = ms;
        self
    }

    /// Set the speed threshold
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

//! # rs-trainz-base
//!
//! A controller for a model train command base reached over a serial line.
//! Every command is a 3-byte frame addressed to one train or switch.
//!
//! ## Features
//!
//! - **Frame codec**: bit-exact encoding of speed, direction, horn and halt commands
//! - **Transport abstraction**: a serial port in production, an in-memory mock in tests
//! - **Serialized dispatch**: one lock per target, so frames never interleave on the wire
//! - **Horn monitor**: a background thread that sounds the horn while the train runs fast
//! - **Interactive control**: single-key operator actions mapped onto dispatches
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `frame` - Addresses, commands and the 3-byte frame
//! - `target` - One train or switch with its current frame and speed
//! - `traits` - The transport seam
//! - `dispatcher` - Mutex-guarded dispatch shared between threads
//! - `horn` - Periodic horn monitor
//! - `controller` - Operator actions
//! - `hal` - Concrete transports (mock for testing, serial for hardware)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_trainz_base::{
//!     CommandDispatcher, HornMonitor, InteractiveController, LoopControl, UserAction,
//!     config::Config,
//!     hal::MockTransport,
//! };
//!
//! let config = Config::default();
//! let transport = MockTransport::new();
//! let wire = transport.clone();
//!
//! let dispatcher = Arc::new(CommandDispatcher::new(config.target.build(), transport));
//! let horn = HornMonitor::new(Arc::clone(&dispatcher), &config.horn).spawn().unwrap();
//! let controller = InteractiveController::new(Arc::clone(&dispatcher));
//!
//! controller.handle(UserAction::Forward).unwrap();
//! controller.handle(UserAction::SetSpeed(3)).unwrap();
//! assert_eq!(controller.handle(UserAction::Quit).unwrap(), LoopControl::Exit);
//!
//! horn.join().unwrap();
//! assert_eq!(wire.last_frame(), Some([0xFE, 0xFF, 0xFF]));
//! ```

#![warn(missing_docs)]

/// Configuration for the link, the target and the horn monitor.
pub mod config;
/// Operator actions and the interactive controller.
pub mod controller;
/// Mutex-guarded command dispatch.
pub mod dispatcher;
/// Error types.
pub mod error;
/// Addresses, commands and the 3-byte wire frame.
pub mod frame;
/// Transport implementations (mock for testing, serial for hardware).
pub mod hal;
/// Background horn monitor.
pub mod horn;
/// A single controlled train or switch.
pub mod target;
/// Core traits for the transport seam.
pub mod traits;

// Re-exports for convenience
pub use controller::{parse_speed, InteractiveController, LoopControl, UserAction, MENU};
pub use dispatcher::{CommandDispatcher, DispatchSession, DispatchStats};
pub use error::{Error, FrameError, Result};
pub use frame::{Address, Command, DecodedFrame, Frame, TargetType, FRAME_LEN, PREAMBLE};
pub use horn::{HornMonitor, HornMonitorHandle, HornReport, MonitorState};
pub use target::{Target, TargetState, MAX_SPEED};
pub use traits::{Transport, TransportError};

// Config re-exports
pub use config::{Config, HornConfig, LinkConfig, TargetConfig};

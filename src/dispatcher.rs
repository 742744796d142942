//! Serialized command dispatch for one target.
//!
//! [`CommandDispatcher`] owns a [`Target`] and its [`Transport`] behind a
//! single `Mutex`. Every dispatch runs "apply command to frame, transmit the
//! frame, update speed" while holding that lock, so concurrent callers (the
//! operator loop and the horn monitor) can never interleave bytes of two
//! frames on the wire.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use rs_trainz_base::{Address, Command, CommandDispatcher, Target, TargetType};
//! use rs_trainz_base::hal::MockTransport;
//!
//! let transport = MockTransport::new();
//! let wire = transport.clone();
//! let target = Target::new(Address::new(23), TargetType::Train);
//! let dispatcher = Arc::new(CommandDispatcher::new(target, transport));
//!
//! let horn = {
//!     let d = Arc::clone(&dispatcher);
//!     thread::spawn(move || d.dispatch(Command::Horn1, 0))
//! };
//! dispatcher.dispatch(Command::AbsoluteSpeed, 8).unwrap();
//! horn.join().unwrap().unwrap();
//!
//! assert_eq!(wire.frames().len(), 2);
//! assert_eq!(dispatcher.speed(), 8);
//! ```
//!
//! # Sessions
//!
//! Operations that read the speed and then send, or send more than one
//! frame, use [`CommandDispatcher::with_session`] so the whole sequence runs
//! under one lock acquisition:
//!
//! ```rust
//! use rs_trainz_base::{Address, Command, CommandDispatcher, Target, TargetType};
//! use rs_trainz_base::hal::MockTransport;
//!
//! let target = Target::new(Address::new(23), TargetType::Train);
//! let dispatcher = CommandDispatcher::new(target, MockTransport::new());
//!
//! dispatcher.with_session(|session| {
//!     let speed = session.speed();
//!     if speed < 20 {
//!         let _ = session.send(Command::RelativeSpeed, 6);
//!         session.set_speed(speed + 1);
//!     }
//! });
//! assert_eq!(dispatcher.speed(), 1);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::frame::{Address, Command, Frame};
use crate::target::{Target, TargetState};
use crate::traits::{Transport, TransportError};

// ============================================================================
// Stats
// ============================================================================

/// Counters kept by the dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatchStats {
    /// Frames handed to the transport.
    pub dispatched: u64,
    /// Frames the transport failed to write.
    pub failed: u64,
}

struct Link<T> {
    target: Target,
    transport: T,
    stats: DispatchStats,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Owns a target and its transport and serializes all sends to it.
///
/// # Thread Safety
///
/// Wrap in an `Arc` and share between threads. A single `Mutex` covers the
/// frame, the transmit call and the speed attribute. The lock is held for
/// exactly one transport write per frame; the dispatcher adds no timeout of
/// its own.
///
/// A poisoned lock is recovered: the target is consistent after every
/// individual mutation, so a panic in another caller leaves nothing half
/// written.
pub struct CommandDispatcher<T: Transport> {
    link: Mutex<Link<T>>,
    halted: AtomicBool,
    address: Address,
}

impl<T: Transport> CommandDispatcher<T> {
    /// Take ownership of a target and the transport that reaches it.
    pub fn new(target: Target, transport: T) -> Self {
        Self {
            address: target.address(),
            link: Mutex::new(Link {
                target,
                transport,
                stats: DispatchStats::default(),
            }),
            halted: AtomicBool::new(false),
        }
    }

    /// Apply a command and transmit the resulting frame.
    ///
    /// The target's frame (and speed, for
    /// [`AbsoluteSpeed`](Command::AbsoluteSpeed)) advance even when the write
    /// fails: what was last commanded locally is authoritative, and the next
    /// command supersedes a dropped one.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the write failed. Nothing is retried.
    pub fn dispatch(&self, command: Command, magnitude: u8) -> Result<(), TransportError> {
        self.with_session(|session| session.send(command, magnitude))
    }

    /// Run several operations under one lock acquisition.
    ///
    /// The closure pattern keeps the lock scoped; do not block inside it on
    /// anything other than the transport.
    pub fn with_session<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut DispatchSession<'_, T>) -> R,
    {
        let mut guard = self.lock();
        let mut session = DispatchSession {
            link: &mut *guard,
            halted: &self.halted,
        };
        f(&mut session)
    }

    /// Whether a [`SystemHalt`](Command::SystemHalt) has been dispatched.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Address of the owned target.
    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current frame.
    pub fn frame(&self) -> Frame {
        self.lock().target.frame()
    }

    /// Last commanded speed step.
    pub fn speed(&self) -> u8 {
        self.lock().target.speed()
    }

    /// Snapshot of the target.
    pub fn state(&self) -> TargetState {
        let link = self.lock();
        TargetState::capture(&link.target, self.is_halted())
    }

    /// Dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.lock().stats
    }

    /// Close the transport.
    ///
    /// Waits for any in-flight dispatch to finish first. Later dispatches
    /// still update the target but their writes fail.
    pub fn close(&self) -> Result<(), TransportError> {
        let mut link = self.lock();
        let result = link.transport.close();
        if let Err(e) = &result {
            warn!(address = %self.address, error = %e, "transport close failed");
        }
        result
    }

    /// Consume the dispatcher, returning the target and transport.
    pub fn into_parts(self) -> (Target, T) {
        let link = self.link.into_inner().unwrap_or_else(PoisonError::into_inner);
        (link.target, link.transport)
    }

    fn lock(&self) -> MutexGuard<'_, Link<T>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Exclusive access to a target for the duration of
/// [`CommandDispatcher::with_session`].
pub struct DispatchSession<'a, T: Transport> {
    link: &'a mut Link<T>,
    halted: &'a AtomicBool,
}

impl<T: Transport> DispatchSession<'_, T> {
    /// Apply a command and transmit it. Same rules as
    /// [`CommandDispatcher::dispatch`].
    pub fn send(&mut self, command: Command, magnitude: u8) -> Result<(), TransportError> {
        let frame = self.link.target.apply(command, magnitude);
        if command == Command::SystemHalt {
            self.halted.store(true, Ordering::Release);
        }

        self.link.stats.dispatched += 1;
        let result = self.link.transport.send(frame.as_bytes());

        match &result {
            Ok(()) => debug!(
                address = %frame.address(),
                %command,
                magnitude,
                frame = %frame,
                "frame sent"
            ),
            Err(e) => {
                self.link.stats.failed += 1;
                warn!(
                    address = %frame.address(),
                    %command,
                    frame = %frame,
                    error = %e,
                    "frame dropped"
                );
            }
        }

        result
    }

    /// Last commanded speed step.
    pub fn speed(&self) -> u8 {
        self.link.target.speed()
    }

    /// Overwrite the speed step without sending anything.
    pub fn set_speed(&mut self, speed: u8) {
        self.link.target.set_speed(speed);
    }

    /// Read-only view of the target.
    pub fn target(&self) -> &Target {
        &self.link.target
    }

    /// Whether a system halt has been dispatched.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

//! Background horn monitor.
//!
//! While the train runs at or above a speed threshold, the monitor sounds
//! [`Horn1`](Command::Horn1) once per period. It stops for good once a
//! [`SystemHalt`](Command::SystemHalt) has been dispatched, which it learns
//! from the dispatcher's halted flag rather than from the frame bytes.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_trainz_base::{Address, Command, CommandDispatcher, HornMonitor, Target, TargetType};
//! use rs_trainz_base::config::HornConfig;
//! use rs_trainz_base::hal::MockTransport;
//!
//! let target = Target::new(Address::new(23), TargetType::Train);
//! let dispatcher = Arc::new(CommandDispatcher::new(target, MockTransport::new()));
//!
//! let config = HornConfig::default().with_period_ms(5);
//! let monitor = HornMonitor::new(Arc::clone(&dispatcher), &config).spawn().unwrap();
//!
//! dispatcher.dispatch(Command::SystemHalt, 0).unwrap();
//! let report = monitor.join().unwrap();
//! assert_eq!(report.horns, 0);
//! ```

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::HornConfig;
use crate::dispatcher::CommandDispatcher;
use crate::frame::Command;
use crate::traits::Transport;

/// Shortest tick period, in milliseconds.
pub const MIN_PERIOD_MS: u32 = 1;

/// Monitor state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    /// Ticking.
    Running,
    /// A system halt was seen; no further dispatches.
    Halted,
}

/// What a monitor did before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HornReport {
    /// Ticks executed.
    pub ticks: u64,
    /// Horn frames sent successfully.
    pub horns: u64,
    /// Horn frames the transport failed to write.
    pub failures: u64,
}

enum Tick {
    Halted,
    Quiet,
    Sounded,
    Failed,
}

/// Periodic horn actor for one dispatcher.
pub struct HornMonitor<T: Transport> {
    dispatcher: Arc<CommandDispatcher<T>>,
    period: Duration,
    threshold: u8,
    state: MonitorState,
    report: HornReport,
}

impl<T: Transport> HornMonitor<T> {
    /// Create a monitor. It does nothing until [`tick`](Self::tick) or
    /// [`spawn`](Self::spawn).
    ///
    /// A zero period is raised to [`MIN_PERIOD_MS`].
    pub fn new(dispatcher: Arc<CommandDispatcher<T>>, config: &HornConfig) -> Self {
        Self {
            dispatcher,
            period: Duration::from_millis(u64::from(config.period_ms.max(MIN_PERIOD_MS))),
            threshold: config.threshold,
            state: MonitorState::Running,
            report: HornReport::default(),
        }
    }

    /// Run one tick.
    ///
    /// The halt check, the speed check and the horn send all happen inside
    /// one dispatcher session, so no horn can follow a halt.
    pub fn tick(&mut self) -> MonitorState {
        if self.state == MonitorState::Halted {
            return self.state;
        }

        self.report.ticks += 1;
        let threshold = self.threshold;

        let tick = self.dispatcher.with_session(|session| {
            if session.is_halted() {
                Tick::Halted
            } else if session.speed() < threshold {
                Tick::Quiet
            } else if session.send(Command::Horn1, 0).is_ok() {
                Tick::Sounded
            } else {
                Tick::Failed
            }
        });

        match tick {
            Tick::Halted => {
                info!(address = %self.dispatcher.address(), "halt observed, horn monitor stopping");
                self.state = MonitorState::Halted;
            }
            Tick::Sounded => {
                self.report.horns += 1;
                debug!(address = %self.dispatcher.address(), "horn");
            }
            Tick::Failed => self.report.failures += 1,
            Tick::Quiet => {}
        }

        self.state
    }

    /// Tick until halted, sleeping one period between ticks.
    pub fn run(mut self) -> HornReport {
        info!(
            address = %self.dispatcher.address(),
            period_ms = u64::try_from(self.period.as_millis()).unwrap_or(u64::MAX),
            threshold = self.threshold,
            "horn monitor started"
        );
        while self.tick() == MonitorState::Running {
            thread::sleep(self.period);
        }
        self.report
    }

    /// Time slept between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Counters so far.
    pub fn report(&self) -> HornReport {
        self.report
    }
}

impl<T: Transport + Send + 'static> HornMonitor<T> {
    /// Run the monitor on its own thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be created.
    pub fn spawn(self) -> io::Result<HornMonitorHandle> {
        let handle = thread::Builder::new()
            .name("horn-monitor".into())
            .spawn(move || self.run())?;
        Ok(HornMonitorHandle { handle })
    }
}

/// Handle to a spawned [`HornMonitor`].
#[derive(Debug)]
pub struct HornMonitorHandle {
    handle: JoinHandle<HornReport>,
}

impl HornMonitorHandle {
    /// Wait for the monitor to observe the halt and finish.
    pub fn join(self) -> thread::Result<HornReport> {
        self.handle.join()
    }

    /// Whether the monitor thread has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

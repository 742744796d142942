//! Operator actions and their translation into dispatches.
//!
//! [`UserAction`] is one menu choice; [`InteractiveController`] turns it into
//! one or more frames on a shared [`CommandDispatcher`]. Anything that reads
//! the speed before sending runs inside a single dispatcher session, so the
//! horn monitor can never slip a frame in between.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_trainz_base::{
//!     Address, CommandDispatcher, InteractiveController, LoopControl, Target, TargetType,
//!     UserAction,
//! };
//! use rs_trainz_base::hal::MockTransport;
//!
//! let target = Target::new(Address::new(23), TargetType::Train);
//! let dispatcher = Arc::new(CommandDispatcher::new(target, MockTransport::new()));
//! let controller = InteractiveController::new(Arc::clone(&dispatcher));
//!
//! controller.handle(UserAction::parse("*7").unwrap()).unwrap();
//! controller.handle(UserAction::IncreaseSpeed).unwrap();
//! assert_eq!(dispatcher.speed(), 8);
//!
//! let control = controller.handle(UserAction::Quit).unwrap();
//! assert_eq!(control, LoopControl::Exit);
//! assert!(dispatcher.is_halted());
//! ```

use std::sync::Arc;

use tracing::warn;

use crate::dispatcher::CommandDispatcher;
use crate::error::{Error, Result};
use crate::frame::Command;
use crate::target::MAX_SPEED;
use crate::traits::Transport;

/// Relative speed magnitude for one step up.
pub const STEP_UP: u8 = 6;

/// Relative speed magnitude for one step down.
pub const STEP_DOWN: u8 = 4;

/// Menu shown by the console.
pub const MENU: &str = "\
Train Controller; select action:
w:\tForward
s:\tReverse
*:\tSet speed (e.g. *12)
+:\tIncrease speed
-:\tDecrease speed
Space:\tBrake
b:\tBoost
1:\tHorn type 1
2:\tHorn type 2
t:\tToggle direction
r:\tReverse speed
h:\tHalt
q:\tQuit
";

// ============================================================================
// User Action
// ============================================================================

/// One operator choice from the menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAction {
    /// `w`: direction forward.
    Forward,
    /// `s`: direction reverse.
    Reverse,
    /// `*N`: absolute speed step, capped at the maximum speed.
    SetSpeed(u8),
    /// `+`: one relative step up, if below the maximum.
    IncreaseSpeed,
    /// `-`: one relative step down, if above zero.
    DecreaseSpeed,
    /// Space: brake.
    Brake,
    /// `b`: boost.
    Boost,
    /// `1`: first horn.
    Horn1,
    /// `2`: second horn.
    Horn2,
    /// `t`: flip direction; the train stops, so speed resets to 0.
    ToggleDirection,
    /// `r`: flip direction and resume the previous speed.
    ReverseSpeed,
    /// `h`: absolute speed 0.
    Halt,
    /// `q`: system halt and leave the loop.
    Quit,
}

impl UserAction {
    /// Map a single menu key. `*` needs a speed and is not handled here.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'w' => Some(UserAction::Forward),
            's' => Some(UserAction::Reverse),
            '+' => Some(UserAction::IncreaseSpeed),
            '-' => Some(UserAction::DecreaseSpeed),
            ' ' => Some(UserAction::Brake),
            'b' => Some(UserAction::Boost),
            '1' => Some(UserAction::Horn1),
            '2' => Some(UserAction::Horn2),
            't' => Some(UserAction::ToggleDirection),
            'r' => Some(UserAction::ReverseSpeed),
            'h' => Some(UserAction::Halt),
            'q' | 'Q' => Some(UserAction::Quit),
            _ => None,
        }
    }

    /// Parse one line of operator input.
    ///
    /// A line holding a single space is [`Brake`](Self::Brake); otherwise
    /// surrounding whitespace is ignored. `*N` (or `* N`) sets speed `N`.
    ///
    /// ```rust
    /// use rs_trainz_base::UserAction;
    ///
    /// assert_eq!(UserAction::parse("w").unwrap(), UserAction::Forward);
    /// assert_eq!(UserAction::parse(" \n").unwrap(), UserAction::Brake);
    /// assert_eq!(UserAction::parse("* 12").unwrap(), UserAction::SetSpeed(12));
    /// assert_eq!(UserAction::parse("*99").unwrap(), UserAction::SetSpeed(20));
    /// assert!(UserAction::parse("x").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let line = input.trim_end_matches(['\r', '\n']);
        if line == " " {
            return Ok(UserAction::Brake);
        }

        let line = line.trim();
        if let Some(rest) = line.strip_prefix('*') {
            return parse_speed(rest).map(UserAction::SetSpeed);
        }

        let mut chars = line.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => UserAction::from_key(key)
                .ok_or_else(|| Error::InvalidUserInput(format!("unknown option {:?}", key))),
            (None, _) => Err(Error::InvalidUserInput("empty input".into())),
            _ => Err(Error::InvalidUserInput(format!("unknown option {:?}", line))),
        }
    }
}

/// Parse a speed step typed by the operator, capping it at [`MAX_SPEED`].
///
/// ```rust
/// use rs_trainz_base::parse_speed;
///
/// assert_eq!(parse_speed(" 7 ").unwrap(), 7);
/// assert_eq!(parse_speed("300").unwrap(), 20);
/// assert!(parse_speed("-1").is_err());
/// assert!(parse_speed("").is_err());
/// ```
pub fn parse_speed(input: &str) -> Result<u8> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::InvalidUserInput("speed required (0 to 20)".into()));
    }
    let value: u32 = s
        .parse()
        .map_err(|_| Error::InvalidUserInput(format!("not a speed: {:?}", s)))?;
    Ok(value.min(u32::from(MAX_SPEED)) as u8)
}

// ============================================================================
// Controller
// ============================================================================

/// Whether the console loop should keep going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    /// Read the next action.
    Continue,
    /// Leave the loop (after a system halt).
    Exit,
}

/// Translates [`UserAction`]s into dispatches.
pub struct InteractiveController<T: Transport> {
    dispatcher: Arc<CommandDispatcher<T>>,
}

impl<T: Transport> InteractiveController<T> {
    /// Create a controller over a shared dispatcher.
    pub fn new(dispatcher: Arc<CommandDispatcher<T>>) -> Self {
        Self { dispatcher }
    }

    /// Carry out one action.
    ///
    /// A failed write is returned as [`Error::WriteFailed`]; local state has
    /// still advanced and the caller should simply continue.
    /// [`UserAction::Quit`] always yields [`LoopControl::Exit`], even if the
    /// halt frame could not be written.
    pub fn handle(&self, action: UserAction) -> Result<LoopControl> {
        let d = &self.dispatcher;

        let sent = match action {
            UserAction::Forward => d.dispatch(Command::Forward, 0),
            UserAction::Reverse => d.dispatch(Command::Reverse, 0),
            UserAction::Brake => d.dispatch(Command::Brake, 0),
            UserAction::Boost => d.dispatch(Command::Boost, 0),
            UserAction::Horn1 => d.dispatch(Command::Horn1, 0),
            UserAction::Horn2 => d.dispatch(Command::Horn2, 0),
            UserAction::Halt => d.dispatch(Command::AbsoluteSpeed, 0),
            UserAction::SetSpeed(speed) => d.dispatch(Command::AbsoluteSpeed, speed.min(MAX_SPEED)),

            UserAction::IncreaseSpeed => d.with_session(|s| {
                let speed = s.speed();
                if speed >= s.target().max_speed() {
                    return Ok(());
                }
                let result = s.send(Command::RelativeSpeed, STEP_UP);
                s.set_speed(speed + 1);
                result
            }),

            UserAction::DecreaseSpeed => d.with_session(|s| {
                let speed = s.speed();
                if speed == 0 {
                    return Ok(());
                }
                let result = s.send(Command::RelativeSpeed, STEP_DOWN);
                s.set_speed(speed - 1);
                result
            }),

            UserAction::ToggleDirection => d.with_session(|s| {
                let result = s.send(Command::ToggleDirection, 0);
                s.set_speed(0);
                result
            }),

            UserAction::ReverseSpeed => d.with_session(|s| {
                let speed = s.speed();
                let toggled = s.send(Command::ToggleDirection, 0);
                let resumed = s.send(Command::AbsoluteSpeed, speed);
                toggled.and(resumed)
            }),

            UserAction::Quit => {
                if let Err(e) = d.dispatch(Command::SystemHalt, 0) {
                    warn!(error = %e, "system halt frame not delivered");
                }
                return Ok(LoopControl::Exit);
            }
        };

        sent.map(|()| LoopControl::Continue).map_err(Error::from)
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher<T>> {
        &self.dispatcher
    }
}

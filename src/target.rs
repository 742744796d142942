//! A single controlled target: its address, type, current frame and the
//! last commanded speed.
//!
//! A [`Target`] is plain data. It is shared between threads only through a
//! [`CommandDispatcher`](crate::CommandDispatcher), which keeps the frame and
//! the speed under one lock.
//!
//! # Example
//!
//! ```rust
//! use rs_trainz_base::{Address, Command, Target, TargetType};
//!
//! let mut train = Target::new(Address::new(23), TargetType::Train);
//! assert_eq!(train.speed(), 0);
//!
//! let frame = train.apply(Command::AbsoluteSpeed, 12);
//! assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0xEC]);
//! assert_eq!(train.speed(), 12);
//! ```

use crate::frame::{Address, Command, Frame, TargetType, FRAME_LEN};

/// Highest speed step an operator can command.
pub const MAX_SPEED: u8 = 20;

/// One train or switch on the bus.
#[derive(Clone, Debug)]
pub struct Target {
    address: Address,
    kind: TargetType,
    frame: Frame,
    speed: u8,
    max_speed: u8,
}

impl Target {
    /// Create a target with a fresh frame and zero speed.
    pub fn new(address: Address, kind: TargetType) -> Self {
        Self {
            address,
            kind,
            frame: Frame::new(address),
            speed: 0,
            max_speed: MAX_SPEED,
        }
    }

    /// Lower the maximum speed step (never above [`MAX_SPEED`]).
    pub fn with_max_speed(mut self, max: u8) -> Self {
        self.max_speed = max.min(MAX_SPEED);
        self.speed = self.speed.min(self.max_speed);
        self
    }

    /// Apply a command to the frame and return the frame to transmit.
    ///
    /// An [`AbsoluteSpeed`](Command::AbsoluteSpeed) also records the new
    /// speed, capped at [`max_speed`](Self::max_speed). No other command
    /// touches the speed.
    pub fn apply(&mut self, command: Command, magnitude: u8) -> Frame {
        self.frame.apply(command, magnitude);
        if command == Command::AbsoluteSpeed {
            self.speed = magnitude.min(self.max_speed);
        }
        self.frame
    }

    /// Bus address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Train or switch.
    pub fn kind(&self) -> TargetType {
        self.kind
    }

    /// Current frame (the last command applied).
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Last commanded speed step.
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Overwrite the speed step, capped at [`max_speed`](Self::max_speed).
    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed.min(self.max_speed);
    }

    /// Highest speed step this target accepts.
    pub fn max_speed(&self) -> u8 {
        self.max_speed
    }
}

/// Snapshot of a target for display and logging.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetState {
    /// Bus address.
    pub address: Address,
    /// Train or switch.
    pub kind: TargetType,
    /// Raw bytes of the current frame.
    pub frame: [u8; FRAME_LEN],
    /// Last commanded speed step.
    pub speed: u8,
    /// Whether a system halt has been dispatched.
    pub halted: bool,
}

impl TargetState {
    pub(crate) fn capture(target: &Target, halted: bool) -> Self {
        Self {
            address: target.address,
            kind: target.kind,
            frame: target.frame.to_bytes(),
            speed: target.speed,
            halted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train() -> Target {
        Target::new(Address::new(23), TargetType::Train)
    }

    #[test]
    fn new_target_is_idle() {
        let t = train();
        assert_eq!(t.address(), Address::new(23));
        assert_eq!(t.kind(), TargetType::Train);
        assert_eq!(t.speed(), 0);
        assert_eq!(t.max_speed(), MAX_SPEED);
        assert_eq!(t.frame().to_bytes(), [0xFE, 0x0B, 0x80]);
    }

    #[test]
    fn absolute_speed_updates_speed() {
        let mut t = train();
        t.apply(Command::AbsoluteSpeed, 7);
        assert_eq!(t.speed(), 7);
    }

    #[test]
    fn absolute_speed_caps_recorded_speed() {
        let mut t = train();
        let frame = t.apply(Command::AbsoluteSpeed, 25);
        // Frame carries the wire value, speed is capped at the operator range
        assert_eq!(frame.decode().unwrap().magnitude, 25);
        assert_eq!(t.speed(), MAX_SPEED);
    }

    #[test]
    fn other_commands_keep_speed() {
        let mut t = train();
        t.apply(Command::AbsoluteSpeed, 9);
        for cmd in [
            Command::RelativeSpeed,
            Command::Boost,
            Command::Brake,
            Command::Forward,
            Command::Reverse,
            Command::Horn1,
            Command::Horn2,
            Command::ToggleDirection,
            Command::SystemHalt,
        ] {
            t.apply(cmd, 3);
            assert_eq!(t.speed(), 9, "{} changed speed", cmd);
        }
    }

    #[test]
    fn lowered_max_speed() {
        let mut t = train().with_max_speed(10);
        t.apply(Command::AbsoluteSpeed, 15);
        assert_eq!(t.speed(), 10);

        t.set_speed(30);
        assert_eq!(t.speed(), 10);
    }

    #[test]
    fn state_snapshot() {
        let mut t = train();
        t.apply(Command::AbsoluteSpeed, 5);
        let state = TargetState::capture(&t, false);
        assert_eq!(state.frame, [0xFE, 0x0B, 0xE5]);
        assert_eq!(state.speed, 5);
        assert!(!state.halted);
    }
}

//! Frame codec for the base-station wire protocol.
//!
//! Every command sent to the base is a fixed 3-byte frame:
//!
//! ```text
//! byte0: 1111 1110                (preamble)
//! byte1: 00AAAAAA                 (address >> 1, or 1111 1111 for a system halt)
//! byte2: B CCCCCCC                (B = address LSB, C = command mask | magnitude)
//! ```
//!
//! The codec is pure: building or updating a [`Frame`] never performs I/O.
//! Transmission happens in [`CommandDispatcher`](crate::CommandDispatcher).
//!
//! # Example
//!
//! ```rust
//! use rs_trainz_base::{Address, Command, Frame};
//!
//! let frame = Frame::new(Address::new(23));
//! assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0x80]);
//!
//! let frame = frame.with_command(Command::AbsoluteSpeed, 5);
//! assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0xE5]);
//!
//! let frame = frame.with_command(Command::SystemHalt, 0);
//! assert_eq!(frame.to_bytes(), [0xFE, 0xFF, 0xFF]);
//! ```

use core::fmt;

use crate::error::FrameError;

/// Number of bytes in a frame.
pub const FRAME_LEN: usize = 3;

/// Constant first byte of every frame.
pub const PREAMBLE: u8 = 0xFE;

/// Bit 7 of byte2 carries the address LSB.
const ADDRESS_LSB_BIT: u8 = 0x80;

/// Low 7 bits of byte2 carry the command mask and magnitude.
const COMMAND_BITS: u8 = 0x7F;

/// Value of byte1 and byte2 in a halt frame.
const HALT_BYTE: u8 = 0xFF;

// ============================================================================
// Address
// ============================================================================

/// A 7-bit bus address identifying one train or switch (0-127).
///
/// [`Address::new`] truncates to the low 7 bits, so `Address::new(151)` is
/// address 23. Use [`Address::try_new`] to reject out-of-range values instead.
///
/// # Example
///
/// ```rust
/// use rs_trainz_base::Address;
///
/// assert_eq!(Address::new(23).value(), 23);
/// assert_eq!(Address::new(128 + 23).value(), 23);
/// assert!(Address::try_new(200).is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Address(u8);

impl Address {
    /// Highest valid address.
    pub const MAX: u8 = 0x7F;

    /// Creates an address, truncating to 7 bits.
    #[inline]
    pub const fn new(raw: u8) -> Self {
        Self(raw & Self::MAX)
    }

    /// Creates an address, rejecting values that do not fit in 7 bits.
    pub const fn try_new(raw: u8) -> Result<Self, FrameError> {
        if raw > Self::MAX {
            Err(FrameError::AddressOutOfRange(raw))
        } else {
            Ok(Self(raw))
        }
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Upper 6 bits of the address, as carried in byte1.
    #[inline]
    pub const fn high_bits(self) -> u8 {
        self.0 >> 1
    }

    /// Least-significant bit of the address, as carried in bit 7 of byte2.
    #[inline]
    pub const fn low_bit(self) -> bool {
        self.0 & 1 == 1
    }

    const fn from_parts(high: u8, low: bool) -> Self {
        Self::new((high << 1) | low as u8)
    }
}

impl TryFrom<u8> for Address {
    type Error = FrameError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::try_new(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Target Type
// ============================================================================

/// Kind of device addressed by a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TargetType {
    /// A locomotive.
    #[default]
    Train,
    /// A track switch.
    Switch,
}

impl TargetType {
    /// Returns the type as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TargetType::Train => "train",
            TargetType::Switch => "switch",
        }
    }

    /// Parse a target type from text (`"train"`, `"switch"`), case-insensitive.
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" | "loco" => Some(TargetType::Train),
            "switch" | "turnout" => Some(TargetType::Switch),
            _ => None,
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// Operation codes understood by the base.
///
/// Each command has a fixed mask OR-ed into byte2. The masks are part of the
/// receiver's protocol and must not change.
///
/// | Command | Mask | Magnitude ceiling |
/// |---------|------|-------------------|
/// | [`AbsoluteSpeed`](Self::AbsoluteSpeed) | `0x60` | `0x1F` |
/// | [`RelativeSpeed`](Self::RelativeSpeed) | `0x40` | `0x0A` |
/// | [`Boost`](Self::Boost) | `0x04` | - |
/// | [`Brake`](Self::Brake) | `0x07` | - |
/// | [`Forward`](Self::Forward) | `0x00` | - |
/// | [`Reverse`](Self::Reverse) | `0x03` | - |
/// | [`Horn1`](Self::Horn1) | `0x1C` | - |
/// | [`Horn2`](Self::Horn2) | `0x1F` | - |
/// | [`ToggleDirection`](Self::ToggleDirection) | `0x01` | - |
/// | [`SystemHalt`](Self::SystemHalt) | `0xFF` | - |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Command {
    /// Set an absolute speed step (magnitude 0-31).
    AbsoluteSpeed,
    /// Step the speed relative to the current one (magnitude 0-10, 5 is neutral).
    RelativeSpeed,
    /// Momentary boost.
    Boost,
    /// Brake.
    Brake,
    /// Set direction forward.
    Forward,
    /// Set direction reverse.
    Reverse,
    /// First horn sound.
    Horn1,
    /// Second horn sound.
    Horn2,
    /// Flip the current direction.
    ToggleDirection,
    /// Stop everything on the layout. Also saturates byte1.
    SystemHalt,
}

impl Command {
    /// All commands, in mask table order.
    pub const ALL: [Command; 10] = [
        Command::AbsoluteSpeed,
        Command::RelativeSpeed,
        Command::Boost,
        Command::Brake,
        Command::Forward,
        Command::Reverse,
        Command::Horn1,
        Command::Horn2,
        Command::ToggleDirection,
        Command::SystemHalt,
    ];

    /// Returns the command's bit mask.
    pub const fn mask(self) -> u8 {
        match self {
            Command::AbsoluteSpeed => 0x60,
            Command::RelativeSpeed => 0x40,
            Command::Boost => 0x04,
            Command::Brake => 0x07,
            Command::Forward => 0x00,
            Command::Reverse => 0x03,
            Command::Horn1 => 0x1C,
            Command::Horn2 => 0x1F,
            Command::ToggleDirection => 0x01,
            Command::SystemHalt => 0xFF,
        }
    }

    /// Highest magnitude the command carries, or `None` if it carries none.
    pub const fn magnitude_ceiling(self) -> Option<u8> {
        match self {
            Command::AbsoluteSpeed => Some(0x1F),
            Command::RelativeSpeed => Some(0x0A),
            _ => None,
        }
    }

    /// Clamps a magnitude to what this command can carry.
    ///
    /// Commands without a magnitude always yield 0.
    ///
    /// ```rust
    /// use rs_trainz_base::Command;
    ///
    /// assert_eq!(Command::AbsoluteSpeed.clamp_magnitude(255), 0x1F);
    /// assert_eq!(Command::RelativeSpeed.clamp_magnitude(12), 0x0A);
    /// assert_eq!(Command::Horn1.clamp_magnitude(7), 0);
    /// ```
    pub const fn clamp_magnitude(self, magnitude: u8) -> u8 {
        match self.magnitude_ceiling() {
            Some(ceiling) if magnitude > ceiling => ceiling,
            Some(_) => magnitude,
            None => 0,
        }
    }

    /// Returns true for the speed commands that carry a magnitude.
    pub const fn is_speed(self) -> bool {
        self.magnitude_ceiling().is_some()
    }

    /// Returns the command name in snake case.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Command::AbsoluteSpeed => "absolute_speed",
            Command::RelativeSpeed => "relative_speed",
            Command::Boost => "boost",
            Command::Brake => "brake",
            Command::Forward => "forward",
            Command::Reverse => "reverse",
            Command::Horn1 => "horn1",
            Command::Horn2 => "horn2",
            Command::ToggleDirection => "toggle_direction",
            Command::SystemHalt => "system_halt",
        }
    }

    /// Parse a command from its name or a short alias, case-insensitive.
    ///
    /// ```rust
    /// use rs_trainz_base::Command;
    ///
    /// assert_eq!(Command::from_text("horn1"), Some(Command::Horn1));
    /// assert_eq!(Command::from_text(" HALT "), Some(Command::SystemHalt));
    /// assert_eq!(Command::from_text("fwd"), Some(Command::Forward));
    /// assert_eq!(Command::from_text("warp"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute_speed" | "abs" | "speed" => Some(Command::AbsoluteSpeed),
            "relative_speed" | "rel" => Some(Command::RelativeSpeed),
            "boost" => Some(Command::Boost),
            "brake" => Some(Command::Brake),
            "forward" | "fwd" => Some(Command::Forward),
            "reverse" | "rev" => Some(Command::Reverse),
            "horn1" => Some(Command::Horn1),
            "horn2" => Some(Command::Horn2),
            "toggle_direction" | "toggle" => Some(Command::ToggleDirection),
            "system_halt" | "halt" => Some(Command::SystemHalt),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One 3-byte command frame for a single address.
///
/// The frame remembers its address so that the address bits can be rebuilt
/// after a [`SystemHalt`](Command::SystemHalt), which saturates byte1 and
/// byte2. For every other command byte1 is `address >> 1` and bit 7 of byte2
/// is the address LSB.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    address: Address,
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Creates a frame for `address` with no command bits set.
    pub const fn new(address: Address) -> Self {
        let lsb = if address.low_bit() { ADDRESS_LSB_BIT } else { 0 };
        Self {
            address,
            bytes: [PREAMBLE, address.high_bits(), lsb],
        }
    }

    /// Returns a copy of this frame carrying `command`.
    ///
    /// The magnitude is clamped for the speed commands and ignored for all
    /// others. See [`apply`](Self::apply).
    #[must_use]
    pub fn with_command(mut self, command: Command, magnitude: u8) -> Self {
        self.apply(command, magnitude);
        self
    }

    /// Replaces the command carried by this frame in place.
    ///
    /// The previous command and magnitude bits are cleared first; the address
    /// bits are kept.
    pub fn apply(&mut self, command: Command, magnitude: u8) {
        let base = Self::new(self.address);
        if command == Command::SystemHalt {
            self.bytes[1] = base.bytes[1] | HALT_BYTE;
            self.bytes[2] = base.bytes[2] | command.mask();
            return;
        }

        self.bytes[1] = base.bytes[1];
        self.bytes[2] = (base.bytes[2] & ADDRESS_LSB_BIT)
            | (command.mask() & COMMAND_BITS)
            | command.clamp_magnitude(magnitude);
    }

    /// The address this frame is built for.
    #[inline]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The raw bytes, ready for transmission.
    #[inline]
    pub const fn to_bytes(self) -> [u8; FRAME_LEN] {
        self.bytes
    }

    /// Borrow the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Command and magnitude bits of byte2 (bit 7 masked off).
    #[inline]
    pub const fn command_bits(&self) -> u8 {
        self.bytes[2] & COMMAND_BITS
    }

    /// Returns true if this is a system halt frame.
    #[inline]
    pub const fn is_halt(&self) -> bool {
        self.bytes[1] == HALT_BYTE && self.bytes[2] == HALT_BYTE
    }

    /// Decode the command this frame carries.
    ///
    /// # Errors
    ///
    /// Returns the [`FrameError`] from [`DecodedFrame::parse`].
    pub fn decode(&self) -> Result<DecodedFrame, FrameError> {
        DecodedFrame::parse(&self.bytes)
    }
}

impl From<Frame> for [u8; FRAME_LEN] {
    fn from(frame: Frame) -> Self {
        frame.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}]", self)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.bytes)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8; FRAME_LEN]) -> fmt::Result {
    write!(f, "{:02X} {:02X} {:02X}", bytes[0], bytes[1], bytes[2])
}

// ============================================================================
// Decoding
// ============================================================================

/// A frame read back from raw bytes.
///
/// The protocol has no read path; decoding exists for logging and for
/// checking what reached a transport.
///
/// # Example
///
/// ```rust
/// use rs_trainz_base::{Address, Command, DecodedFrame};
///
/// let decoded = DecodedFrame::parse(&[0xFE, 0x0B, 0xE5]).unwrap();
/// assert_eq!(decoded.address, Some(Address::new(23)));
/// assert_eq!(decoded.command, Command::AbsoluteSpeed);
/// assert_eq!(decoded.magnitude, 5);
///
/// let halt = DecodedFrame::parse(&[0xFE, 0xFF, 0xFF]).unwrap();
/// assert_eq!(halt.command, Command::SystemHalt);
/// assert_eq!(halt.address, None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Target address. `None` for a halt frame, which erases the address.
    pub address: Option<Address>,
    /// Command carried by the frame.
    pub command: Command,
    /// Magnitude (0 for commands without one).
    pub magnitude: u8,
}

impl DecodedFrame {
    /// Parse 3 raw bytes.
    pub fn parse(bytes: &[u8; FRAME_LEN]) -> Result<Self, FrameError> {
        if bytes[0] != PREAMBLE {
            return Err(FrameError::BadPreamble(bytes[0]));
        }

        if bytes[1] == HALT_BYTE && bytes[2] == HALT_BYTE {
            return Ok(Self {
                address: None,
                command: Command::SystemHalt,
                magnitude: 0,
            });
        }

        if bytes[1] > Address::MAX >> 1 {
            return Err(FrameError::BadAddressByte(bytes[1]));
        }

        let address = Address::from_parts(bytes[1], bytes[2] & ADDRESS_LSB_BIT != 0);
        let bits = bytes[2] & COMMAND_BITS;
        let (command, magnitude) = match bits {
            0x60..=0x7F => (Command::AbsoluteSpeed, bits - 0x60),
            0x40..=0x4A => (Command::RelativeSpeed, bits - 0x40),
            0x00 => (Command::Forward, 0),
            0x01 => (Command::ToggleDirection, 0),
            0x03 => (Command::Reverse, 0),
            0x04 => (Command::Boost, 0),
            0x07 => (Command::Brake, 0),
            0x1C => (Command::Horn1, 0),
            0x1F => (Command::Horn2, 0),
            other => return Err(FrameError::UnknownCommand(other)),
        };

        Ok(Self {
            address: Some(address),
            command,
            magnitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Address Tests
    // =========================================================================

    #[test]
    fn address_truncates_to_seven_bits() {
        assert_eq!(Address::new(0x7F).value(), 0x7F);
        assert_eq!(Address::new(0x80).value(), 0);
        assert_eq!(Address::new(0xFF).value(), 0x7F);
    }

    #[test]
    fn address_try_new_rejects_out_of_range() {
        assert_eq!(Address::try_new(127), Ok(Address::new(127)));
        assert_eq!(Address::try_new(128), Err(FrameError::AddressOutOfRange(128)));
        assert!(Address::try_from(255).is_err());
    }

    #[test]
    fn address_parts() {
        let a = Address::new(23);
        assert_eq!(a.high_bits(), 11);
        assert!(a.low_bit());
        assert!(!Address::new(22).low_bit());
    }

    // =========================================================================
    // Command Tests
    // =========================================================================

    #[test]
    fn command_masks_match_protocol() {
        assert_eq!(Command::AbsoluteSpeed.mask(), 0x60);
        assert_eq!(Command::RelativeSpeed.mask(), 0x40);
        assert_eq!(Command::Boost.mask(), 0x04);
        assert_eq!(Command::Brake.mask(), 0x07);
        assert_eq!(Command::Forward.mask(), 0x00);
        assert_eq!(Command::Reverse.mask(), 0x03);
        assert_eq!(Command::Horn1.mask(), 0x1C);
        assert_eq!(Command::Horn2.mask(), 0x1F);
        assert_eq!(Command::ToggleDirection.mask(), 0x01);
        assert_eq!(Command::SystemHalt.mask(), 0xFF);
    }

    #[test]
    fn command_text_round_trips_names() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_text(cmd.as_str()), Some(cmd));
        }
    }

    #[test]
    fn target_type_from_text() {
        assert_eq!(TargetType::from_text("Train"), Some(TargetType::Train));
        assert_eq!(TargetType::from_text(" switch "), Some(TargetType::Switch));
        assert_eq!(TargetType::from_text("boat"), None);
    }

    // =========================================================================
    // Frame Tests
    // =========================================================================

    #[test]
    fn init_frame_for_address_23() {
        assert_eq!(Frame::new(Address::new(23)).to_bytes(), [0xFE, 0x0B, 0x80]);
    }

    #[test]
    fn init_frame_even_address_has_clear_lsb() {
        assert_eq!(Frame::new(Address::new(22)).to_bytes(), [0xFE, 0x0B, 0x00]);
    }

    #[test]
    fn absolute_speed_scenario() {
        let frame = Frame::new(Address::new(23)).with_command(Command::AbsoluteSpeed, 5);
        assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0xE5]);
    }

    #[test]
    fn halt_saturates_both_bytes() {
        let frame = Frame::new(Address::new(22)).with_command(Command::SystemHalt, 9);
        assert_eq!(frame.to_bytes(), [0xFE, 0xFF, 0xFF]);
        assert!(frame.is_halt());
    }

    #[test]
    fn command_after_halt_restores_address_bits() {
        let frame = Frame::new(Address::new(22))
            .with_command(Command::SystemHalt, 0)
            .with_command(Command::Horn1, 0);
        assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0x1C]);
    }

    #[test]
    fn new_command_replaces_old_bits() {
        let frame = Frame::new(Address::new(23))
            .with_command(Command::AbsoluteSpeed, 0x1F)
            .with_command(Command::Reverse, 0);
        assert_eq!(frame.to_bytes(), [0xFE, 0x0B, 0x83]);
    }

    #[test]
    fn magnitude_ignored_for_plain_commands() {
        let plain = Frame::new(Address::new(5)).with_command(Command::Brake, 0);
        let noisy = Frame::new(Address::new(5)).with_command(Command::Brake, 0x55);
        assert_eq!(plain, noisy);
    }

    #[test]
    fn display_is_hex() {
        let frame = Frame::new(Address::new(23)).with_command(Command::AbsoluteSpeed, 5);
        assert_eq!(format!("{}", frame), "FE 0B E5");
        assert_eq!(format!("{:?}", frame), "Frame[FE 0B E5]");
    }

    // =========================================================================
    // Decode Tests
    // =========================================================================

    #[test]
    fn decode_recovers_every_command() {
        let base = Frame::new(Address::new(77));
        for cmd in Command::ALL {
            let magnitude = if cmd.is_speed() { 3 } else { 0 };
            let decoded = base.with_command(cmd, magnitude).decode().unwrap();
            assert_eq!(decoded.command, cmd);
            assert_eq!(decoded.magnitude, magnitude);
        }
    }

    #[test]
    fn decode_of_fresh_frame_is_forward() {
        let decoded = Frame::new(Address::new(23)).decode().unwrap();
        assert_eq!(decoded.command, Command::Forward);
        assert_eq!(decoded.address, Some(Address::new(23)));
    }

    #[test]
    fn decode_surfaces_parse_result() {
        let halt = Frame::new(Address::new(9)).with_command(Command::SystemHalt, 0);
        assert_eq!(
            halt.decode(),
            Ok(DecodedFrame {
                address: None,
                command: Command::SystemHalt,
                magnitude: 0,
            })
        );
        assert_eq!(halt.decode(), DecodedFrame::parse(halt.as_bytes()));
    }

    #[test]
    fn decode_rejects_bad_preamble() {
        assert_eq!(
            DecodedFrame::parse(&[0x00, 0x0B, 0x80]),
            Err(FrameError::BadPreamble(0x00))
        );
    }

    #[test]
    fn decode_rejects_unknown_bits() {
        assert_eq!(
            DecodedFrame::parse(&[0xFE, 0x0B, 0x82]),
            Err(FrameError::UnknownCommand(0x02))
        );
        assert_eq!(
            DecodedFrame::parse(&[0xFE, 0x40, 0x80]),
            Err(FrameError::BadAddressByte(0x40))
        );
    }
}

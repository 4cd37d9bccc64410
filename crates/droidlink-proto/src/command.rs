//! Typed command model carried inside frames.
//!
//! A [`Command`] is one addressed message between two controller regions.
//! The payload is a closed sum type ([`CommandData`]) with exactly one
//! variant populated; the codec records which variant is present as an
//! explicit discriminant on the wire, so an unknown discriminant fails
//! decoding instead of producing a half-initialised record.

/// Physical node identity, carried as `source` and `target` of a command.
///
/// Values are stable wire constants; adding a region must not renumber
/// existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    /// No region configured (the default for an unconfigured link).
    #[default]
    Unspecified,
    /// Dome controller.
    Dome,
    /// Body controller.
    Body,
}

impl Region {
    /// Wire value of this region.
    #[must_use]
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Dome => 1,
            Self::Body => 2,
        }
    }

    /// Parse a wire value. Returns `None` for values this build does not
    /// know, which the codec reports as a decode error.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Dome),
            2 => Some(Self::Body),
            _ => None,
        }
    }
}

/// Movement target referenced by [`MoveCommand`] payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Actuator {
    /// No actuator selected.
    #[default]
    Unspecified,
    /// Neck joint on the body.
    BodyNeck,
    /// Dome rotation motor.
    DomeRotation,
}

impl Actuator {
    /// Wire value of this actuator.
    #[must_use]
    pub fn to_u32(self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::BodyNeck => 1,
            Self::DomeRotation => 2,
        }
    }

    /// Parse a wire value. Returns `None` for unknown values.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::BodyNeck),
            2 => Some(Self::DomeRotation),
            _ => None,
        }
    }
}

/// LED effect request: light a strip segment for a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedCommand {
    /// First LED index of the segment.
    pub start: u32,
    /// Last LED index of the segment.
    pub end: u32,
    /// Effect duration in milliseconds (0 = until replaced).
    pub duration: u32,
}

/// Sound playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoundCommand {
    /// Sound bank index.
    pub id: u32,
    /// Start (true) or stop (false) playback.
    pub play: bool,
    /// Drive the LED strip from the audio envelope while playing.
    pub sync_to_leds: bool,
}

/// Actuator motion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveCommand {
    /// Which actuator to move.
    pub target: Actuator,
    /// Position or velocity on the X axis (actuator-defined units).
    pub x: u32,
    /// Position or velocity on the Y axis.
    pub y: u32,
    /// Position or velocity on the Z axis.
    pub z: u32,
}

/// Longest permitted `reason` string, in bytes (excluding any terminator).
pub const MAX_REASON_LEN: usize = 63;

/// Acknowledgement reply. `acknowledged = false` is a NACK and asks the
/// sender to retransmit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckCommand {
    /// Positive (ACK) or negative (NACK) acknowledgement.
    pub acknowledged: bool,
    /// Optional human-readable rejection reason, at most
    /// [`MAX_REASON_LEN`] bytes of UTF-8.
    pub reason: String,
}

/// Command payload: exactly one variant is populated.
///
/// The codec is the single point that maps each variant to its wire
/// discriminant; see [`CommandData::field_number`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandData {
    /// LED effect request.
    Led(LedCommand),
    /// Sound playback request.
    Sound(SoundCommand),
    /// Actuator motion request.
    Move(MoveCommand),
    /// Acknowledgement reply.
    Ack(AckCommand),
}

impl CommandData {
    /// Wire discriminant of this variant (the schema field number).
    #[must_use]
    pub fn field_number(&self) -> u32 {
        match self {
            Self::Led(_) => 4,
            Self::Sound(_) => 5,
            Self::Move(_) => 6,
            Self::Ack(_) => 7,
        }
    }
}

/// One addressed message between regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Message identifier, assigned by the sender from its timestamp
    /// provider. Uniqueness within the dedup window is the sender's
    /// responsibility.
    pub id: u32,
    /// Region that produced the command.
    pub source: Region,
    /// Region the command is addressed to.
    pub target: Region,
    /// The populated payload variant.
    pub data: CommandData,
}

impl Command {
    /// True when this command is an ACK/NACK reply rather than an
    /// application command.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        matches!(self.data, CommandData::Ack(_))
    }
}

//! Error types for the wire protocol.
//!
//! Strongly-typed errors per layer: encoding a command, decoding a payload,
//! and framing a byte stream. The reliability engine in `droidlink-core`
//! absorbs decode and frame errors locally (dropped payload, framer resync);
//! encode errors surface to the caller of `send`.

use thiserror::Error;

use crate::command::MAX_REASON_LEN;

/// Errors producing the wire encoding of a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Destination buffer cannot hold the encoded command.
    #[error("destination buffer too small for encoded command")]
    BufferTooSmall,

    /// The acknowledgement reason exceeds [`MAX_REASON_LEN`] bytes.
    #[error("ack reason is {len} bytes, limit is {MAX_REASON_LEN}")]
    ReasonTooLong {
        /// Byte length of the offending reason string.
        len: usize,
    },
}

/// Errors decoding a framed payload into a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload ended inside a field.
    #[error("payload truncated")]
    Truncated,

    /// Varint ran past the 64-bit range.
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// Field number this schema does not define.
    #[error("unknown field {field}")]
    UnknownField {
        /// Offending field number.
        field: u32,
    },

    /// Known field carried the wrong wire type.
    #[error("field {field} has unexpected wire type {wire_type}")]
    WireType {
        /// Field number.
        field: u32,
        /// Wire type found on the wire.
        wire_type: u8,
    },

    /// Enum field carried a value this build does not know.
    #[error("field {field} has unrecognised enum value {value}")]
    InvalidEnum {
        /// Field number.
        field: u32,
        /// Value found on the wire.
        value: u32,
    },

    /// No payload variant was present.
    #[error("command carries no payload variant")]
    MissingVariant,

    /// The acknowledgement reason exceeds [`MAX_REASON_LEN`] bytes.
    #[error("ack reason is {len} bytes, limit is {MAX_REASON_LEN}")]
    ReasonTooLong {
        /// Byte length of the offending reason string.
        len: usize,
    },

    /// The acknowledgement reason is not valid UTF-8.
    #[error("ack reason is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors assembling or parsing wire frames.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The LEN byte exceeds the payload buffer capacity.
    #[error("frame length {len} exceeds maximum payload {max}")]
    LengthTooLarge {
        /// Length announced by the frame.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },

    /// The received CRC does not match the payload.
    #[error("crc mismatch: expected {expected:#04x}, found {found:#04x}")]
    CrcMismatch {
        /// CRC computed over the received payload.
        expected: u8,
        /// CRC byte found on the wire.
        found: u8,
    },
}

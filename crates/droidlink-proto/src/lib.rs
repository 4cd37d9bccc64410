//! Wire protocol for the droidlink command link.
//!
//! This crate defines the typed command model exchanged between controller
//! regions, the schema codec that maps commands to bounded byte payloads, and
//! the CRC-protected frame layer that carries payloads over a raw byte
//! stream. It performs no I/O and never consults a clock; the reliability
//! engine lives in `droidlink-core`.
//!
//! Wire layout of one frame:
//!
//! ```text
//! +--------+--------+-----------+--------+
//! | START  |  LEN   |  PAYLOAD  |  CRC8  |
//! +--------+--------+-----------+--------+
//! | 1 byte | 1 byte | LEN bytes | 1 byte |
//! +--------+--------+-----------+--------+
//! ```
//!
//! The payload is a schema-encoded [`Command`]; the CRC covers the payload
//! bytes only.

pub mod codec;
pub mod command;
pub mod crc;
pub mod errors;
pub mod frame;

pub use command::{
    Actuator, AckCommand, Command, CommandData, LedCommand, MoveCommand, Region, SoundCommand,
};
pub use crc::crc8;
pub use errors::{DecodeError, EncodeError, FrameError};
pub use frame::{Deframer, MAX_PAYLOAD, START_BYTE, encode_frame};

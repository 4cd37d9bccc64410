//! Wire framing: START byte, one-byte length, payload, CRC-8.
//!
//! The framer is buffer-oriented and performs no I/O. [`encode_frame`]
//! wraps an already-encoded payload; [`Deframer`] reassembles payloads from
//! a raw byte stream one byte at a time, surviving byte loss and sync loss
//! by resynchronising on the next START byte after any framing error.
//!
//! # Invariants
//!
//! - A delivered payload always has a matching CRC; corrupt frames are
//!   rejected before delivery.
//! - Any framing error fully resets the parser. The next accepted byte
//!   must be START; intervening bytes are discarded silently.

use bytes::BufMut;

use crate::{crc::crc8, errors::FrameError};

/// Frame sentinel. Both peers must agree on this value; resynchronisation
/// relies on resetting on framing errors rather than on START being
/// unambiguous inside payload bytes.
pub const START_BYTE: u8 = 0x7E;

/// Largest permitted payload length. Bounds the LEN byte and the reassembly
/// buffer alike.
pub const MAX_PAYLOAD: usize = 128;

/// Framing overhead in bytes: START, LEN, CRC.
pub const OVERHEAD: usize = 3;

/// Wrap an encoded payload into one wire frame.
///
/// Writes `START | LEN | payload | CRC8(payload)` into `dst`.
///
/// # Errors
///
/// - [`FrameError::LengthTooLarge`] when the payload exceeds
///   [`MAX_PAYLOAD`]
pub fn encode_frame(payload: &[u8], dst: &mut impl BufMut) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::LengthTooLarge { len: payload.len(), max: MAX_PAYLOAD });
    }

    dst.put_u8(START_BYTE);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(crc8(payload));

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeframeState {
    /// Discarding bytes until START.
    AwaitStart,
    /// START seen, next byte is LEN.
    AwaitLen,
    /// Accumulating payload bytes.
    Payload,
    /// Payload complete, next byte is the CRC.
    Crc,
}

/// Incremental frame parser.
///
/// Feed bytes with [`Deframer::push`]; a complete, CRC-valid payload is
/// returned as a borrowed span the moment its CRC byte arrives. Partial
/// frames persist across pushes, so the parser can be driven from a
/// non-blocking stream at whatever pace bytes trickle in.
#[derive(Debug)]
pub struct Deframer {
    state: DeframeState,
    len: usize,
    filled: usize,
    buf: [u8; MAX_PAYLOAD],
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deframer {
    /// Create a parser waiting for a START byte.
    #[must_use]
    pub fn new() -> Self {
        Self { state: DeframeState::AwaitStart, len: 0, filled: 0, buf: [0; MAX_PAYLOAD] }
    }

    /// Discard any partial frame and wait for the next START byte.
    pub fn reset(&mut self) {
        self.state = DeframeState::AwaitStart;
        self.len = 0;
        self.filled = 0;
    }

    /// True while a frame is partially assembled.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        self.state != DeframeState::AwaitStart
    }

    /// Consume one byte from the stream.
    ///
    /// Returns `Ok(Some(payload))` when this byte completed a CRC-valid
    /// frame, `Ok(None)` while mid-frame or while discarding noise between
    /// frames.
    ///
    /// # Errors
    ///
    /// - [`FrameError::LengthTooLarge`] for a LEN byte over [`MAX_PAYLOAD`]
    /// - [`FrameError::CrcMismatch`] when the CRC byte does not match
    ///
    /// Either error fully resets the parser; the caller just keeps feeding
    /// bytes.
    pub fn push(&mut self, byte: u8) -> Result<Option<&[u8]>, FrameError> {
        match self.state {
            DeframeState::AwaitStart => {
                if byte == START_BYTE {
                    self.state = DeframeState::AwaitLen;
                }
                Ok(None)
            },
            DeframeState::AwaitLen => {
                let len = byte as usize;
                if len > MAX_PAYLOAD {
                    self.reset();
                    return Err(FrameError::LengthTooLarge { len, max: MAX_PAYLOAD });
                }
                self.len = len;
                self.filled = 0;
                self.state = if len == 0 { DeframeState::Crc } else { DeframeState::Payload };
                Ok(None)
            },
            DeframeState::Payload => {
                // len was range-checked on arrival, so filled < MAX_PAYLOAD.
                self.buf[self.filled] = byte;
                self.filled += 1;
                if self.filled == self.len {
                    self.state = DeframeState::Crc;
                }
                Ok(None)
            },
            DeframeState::Crc => {
                let frame_len = self.len;
                let expected = crc8(&self.buf[..frame_len]);
                self.reset();
                if byte == expected {
                    Ok(Some(&self.buf[..frame_len]))
                } else {
                    Err(FrameError::CrcMismatch { expected, found: byte })
                }
            },
        }
    }
}

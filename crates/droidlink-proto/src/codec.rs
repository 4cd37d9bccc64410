//! Schema codec between [`Command`] records and bounded byte payloads.
//!
//! Tag/length/value layout with varint scalars: each field is a varint key
//! (`field_number << 3 | wire_type`) followed by either a varint value or a
//! length-delimited span. Zero-valued scalars are omitted. The populated
//! payload variant is encoded as a length-delimited sub-message under its
//! own field number. That sub-message is always emitted, even when every
//! inner field is zero, so the discriminant survives zero-value
//! suppression.
//!
//! Schema:
//!
//! ```text
//! Command { id = 1, source = 2, target = 3,
//!           oneof data { led = 4, sound = 5, move = 6, ack = 7 } }
//! Led    { start = 1, end = 2, duration = 3 }
//! Sound  { id = 1, play = 2, sync_to_leds = 3 }
//! Move   { target = 1, x = 2, y = 3, z = 4 }
//! Ack    { acknowledged = 1, reason = 2 }
//! ```
//!
//! The codec is self-delimiting only at the payload boundary: the caller
//! passes the exact payload length recovered from the frame LEN byte, and
//! [`Command::decode`] consumes it entirely.
//!
//! # Invariants
//!
//! - Round-trip identity: `decode(encode(c)) == c` for every encodable
//!   command.
//! - Exactly one variant: decoding fails with
//!   [`DecodeError::MissingVariant`] when no variant field is present; when
//!   a variant field repeats, the last occurrence wins.

use crate::{
    command::{
        Actuator, AckCommand, Command, CommandData, LedCommand, MAX_REASON_LEN, MoveCommand,
        Region, SoundCommand,
    },
    errors::{DecodeError, EncodeError},
};

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

const fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encoded length of one varint scalar field, zero suppressed.
const fn scalar_len(value: u64) -> usize {
    // Field numbers 1..=7 keep the key in one byte.
    if value == 0 { 0 } else { 1 + varint_len(value) }
}

fn body_len(data: &CommandData) -> usize {
    match data {
        CommandData::Led(led) => {
            scalar_len(u64::from(led.start))
                + scalar_len(u64::from(led.end))
                + scalar_len(u64::from(led.duration))
        },
        CommandData::Sound(sound) => {
            scalar_len(u64::from(sound.id))
                + scalar_len(u64::from(sound.play))
                + scalar_len(u64::from(sound.sync_to_leds))
        },
        CommandData::Move(mv) => {
            scalar_len(u64::from(mv.target.to_u32()))
                + scalar_len(u64::from(mv.x))
                + scalar_len(u64::from(mv.y))
                + scalar_len(u64::from(mv.z))
        },
        CommandData::Ack(ack) => {
            let reason = if ack.reason.is_empty() {
                0
            } else {
                1 + varint_len(ack.reason.len() as u64) + ack.reason.len()
            };
            scalar_len(u64::from(ack.acknowledged)) + reason
        },
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put_u8(&mut self, byte: u8) -> Result<(), EncodeError> {
        let slot = self.buf.get_mut(self.pos).ok_or(EncodeError::BufferTooSmall)?;
        *slot = byte;
        self.pos += 1;
        Ok(())
    }

    fn put_varint(&mut self, mut value: u64) -> Result<(), EncodeError> {
        while value >= 0x80 {
            self.put_u8((value as u8 & 0x7F) | 0x80)?;
            value >>= 7;
        }
        self.put_u8(value as u8)
    }

    fn put_key(&mut self, field: u32, wire_type: u8) -> Result<(), EncodeError> {
        self.put_varint(u64::from(field) << 3 | u64::from(wire_type))
    }

    /// Varint scalar field, omitted when zero.
    fn put_scalar(&mut self, field: u32, value: u64) -> Result<(), EncodeError> {
        if value != 0 {
            self.put_key(field, WIRE_VARINT)?;
            self.put_varint(value)?;
        }
        Ok(())
    }

    fn put_slice(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        for &byte in bytes {
            self.put_u8(byte)?;
        }
        Ok(())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.buf.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn varint(&mut self) -> Result<u64, DecodeError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            if shift >= 64 || (shift == 63 && byte > 1) {
                return Err(DecodeError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn key(&mut self) -> Result<(u32, u8), DecodeError> {
        let key = self.varint()?;
        Ok(((key >> 3) as u32, (key & 0x7) as u8))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let span = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(span)
    }
}

fn expect_varint(field: u32, wire_type: u8) -> Result<(), DecodeError> {
    if wire_type == WIRE_VARINT { Ok(()) } else { Err(DecodeError::WireType { field, wire_type }) }
}

fn decode_led(bytes: &[u8]) -> Result<LedCommand, DecodeError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut led = LedCommand::default();
    while !reader.done() {
        let (field, wire_type) = reader.key()?;
        expect_varint(field, wire_type)?;
        let value = reader.varint()? as u32;
        match field {
            1 => led.start = value,
            2 => led.end = value,
            3 => led.duration = value,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(led)
}

fn decode_sound(bytes: &[u8]) -> Result<SoundCommand, DecodeError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut sound = SoundCommand::default();
    while !reader.done() {
        let (field, wire_type) = reader.key()?;
        expect_varint(field, wire_type)?;
        let value = reader.varint()?;
        match field {
            1 => sound.id = value as u32,
            2 => sound.play = value != 0,
            3 => sound.sync_to_leds = value != 0,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(sound)
}

fn decode_move(bytes: &[u8]) -> Result<MoveCommand, DecodeError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut mv = MoveCommand::default();
    while !reader.done() {
        let (field, wire_type) = reader.key()?;
        expect_varint(field, wire_type)?;
        let value = reader.varint()? as u32;
        match field {
            1 => {
                mv.target =
                    Actuator::from_u32(value).ok_or(DecodeError::InvalidEnum { field, value })?;
            },
            2 => mv.x = value,
            3 => mv.y = value,
            4 => mv.z = value,
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(mv)
}

fn decode_ack(bytes: &[u8]) -> Result<AckCommand, DecodeError> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut ack = AckCommand::default();
    while !reader.done() {
        let (field, wire_type) = reader.key()?;
        match field {
            1 => {
                expect_varint(field, wire_type)?;
                ack.acknowledged = reader.varint()? != 0;
            },
            2 => {
                if wire_type != WIRE_LEN {
                    return Err(DecodeError::WireType { field, wire_type });
                }
                let len = reader.varint()? as usize;
                if len > MAX_REASON_LEN {
                    return Err(DecodeError::ReasonTooLong { len });
                }
                let span = reader.take(len)?;
                ack.reason =
                    str::from_utf8(span).map_err(|_| DecodeError::InvalidUtf8)?.to_owned();
            },
            _ => return Err(DecodeError::UnknownField { field }),
        }
    }
    Ok(ack)
}

impl Command {
    /// Encode into the caller's buffer, returning the number of bytes
    /// written.
    ///
    /// The buffer is typically the frame payload buffer
    /// ([`crate::frame::MAX_PAYLOAD`] bytes); encoding fails without side
    /// effects on the wire when the command does not fit.
    ///
    /// # Errors
    ///
    /// - [`EncodeError::BufferTooSmall`] when the encoding overruns `buf`
    /// - [`EncodeError::ReasonTooLong`] when an ack reason exceeds
    ///   [`MAX_REASON_LEN`] bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        if let CommandData::Ack(ack) = &self.data {
            if ack.reason.len() > MAX_REASON_LEN {
                return Err(EncodeError::ReasonTooLong { len: ack.reason.len() });
            }
        }

        let mut writer = Writer { buf, pos: 0 };
        writer.put_scalar(1, u64::from(self.id))?;
        writer.put_scalar(2, u64::from(self.source.to_u32()))?;
        writer.put_scalar(3, u64::from(self.target.to_u32()))?;

        // The variant sub-message always goes out, empty or not.
        writer.put_key(self.data.field_number(), WIRE_LEN)?;
        writer.put_varint(body_len(&self.data) as u64)?;
        match &self.data {
            CommandData::Led(led) => {
                writer.put_scalar(1, u64::from(led.start))?;
                writer.put_scalar(2, u64::from(led.end))?;
                writer.put_scalar(3, u64::from(led.duration))?;
            },
            CommandData::Sound(sound) => {
                writer.put_scalar(1, u64::from(sound.id))?;
                writer.put_scalar(2, u64::from(sound.play))?;
                writer.put_scalar(3, u64::from(sound.sync_to_leds))?;
            },
            CommandData::Move(mv) => {
                writer.put_scalar(1, u64::from(mv.target.to_u32()))?;
                writer.put_scalar(2, u64::from(mv.x))?;
                writer.put_scalar(3, u64::from(mv.y))?;
                writer.put_scalar(4, u64::from(mv.z))?;
            },
            CommandData::Ack(ack) => {
                writer.put_scalar(1, u64::from(ack.acknowledged))?;
                if !ack.reason.is_empty() {
                    writer.put_key(2, WIRE_LEN)?;
                    writer.put_varint(ack.reason.len() as u64)?;
                    writer.put_slice(ack.reason.as_bytes())?;
                }
            },
        }
        Ok(writer.pos)
    }

    /// Decode a command from an exact-length payload span.
    ///
    /// # Errors
    ///
    /// Fails on truncation, varint overflow, unknown field numbers, wire
    /// type mismatches, unrecognised enum values, a missing payload
    /// variant, or an over-long / non-UTF-8 ack reason.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader { buf: bytes, pos: 0 };
        let mut id = 0u32;
        let mut source = Region::Unspecified;
        let mut target = Region::Unspecified;
        let mut data: Option<CommandData> = None;

        while !reader.done() {
            let (field, wire_type) = reader.key()?;
            match field {
                1 => {
                    expect_varint(field, wire_type)?;
                    id = reader.varint()? as u32;
                },
                2 | 3 => {
                    expect_varint(field, wire_type)?;
                    let value = reader.varint()? as u32;
                    let region =
                        Region::from_u32(value).ok_or(DecodeError::InvalidEnum { field, value })?;
                    if field == 2 {
                        source = region;
                    } else {
                        target = region;
                    }
                },
                4..=7 => {
                    if wire_type != WIRE_LEN {
                        return Err(DecodeError::WireType { field, wire_type });
                    }
                    let len = reader.varint()? as usize;
                    let body = reader.take(len)?;
                    data = Some(match field {
                        4 => CommandData::Led(decode_led(body)?),
                        5 => CommandData::Sound(decode_sound(body)?),
                        6 => CommandData::Move(decode_move(body)?),
                        _ => CommandData::Ack(decode_ack(body)?),
                    });
                },
                _ => return Err(DecodeError::UnknownField { field }),
            }
        }

        let data = data.ok_or(DecodeError::MissingVariant)?;
        Ok(Self { id, source, target, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MAX_PAYLOAD;

    fn encode_to_vec(cmd: &Command) -> Vec<u8> {
        let mut buf = [0u8; MAX_PAYLOAD];
        let len = cmd.encode(&mut buf).expect("command fits the payload buffer");
        buf[..len].to_vec()
    }

    #[test]
    fn led_wire_layout() {
        let cmd = Command {
            id: 42,
            source: Region::Unspecified,
            target: Region::Unspecified,
            data: CommandData::Led(LedCommand { start: 1, end: 2, duration: 10 }),
        };
        assert_eq!(hex::encode(encode_to_vec(&cmd)), "082a220608011002180a");
    }

    #[test]
    fn ack_wire_layout_with_reason() {
        let cmd = Command {
            id: 43,
            source: Region::Unspecified,
            target: Region::Unspecified,
            data: CommandData::Ack(AckCommand {
                acknowledged: true,
                reason: "Test reason".to_owned(),
            }),
        };
        assert_eq!(hex::encode(encode_to_vec(&cmd)), "082b3a0f0801120b5465737420726561736f6e");
    }

    #[test]
    fn nack_without_reason_keeps_discriminant() {
        let cmd = Command {
            id: 46,
            source: Region::Unspecified,
            target: Region::Unspecified,
            data: CommandData::Ack(AckCommand { acknowledged: false, reason: String::new() }),
        };
        // Empty sub-message still marks the ack variant.
        assert_eq!(hex::encode(encode_to_vec(&cmd)), "082e3a00");

        let decoded = Command::decode(&encode_to_vec(&cmd)).expect("decodes");
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn move_wire_layout() {
        let cmd = Command {
            id: 44,
            source: Region::Unspecified,
            target: Region::Unspecified,
            data: CommandData::Move(MoveCommand {
                target: Actuator::BodyNeck,
                x: 100,
                y: 200,
                z: 300,
            }),
        };
        assert_eq!(hex::encode(encode_to_vec(&cmd)), "082c320a0801106418c80120ac02");
    }

    #[test]
    fn sound_round_trip() {
        let cmd = Command {
            id: 45,
            source: Region::Dome,
            target: Region::Body,
            data: CommandData::Sound(SoundCommand { id: 7, play: true, sync_to_leds: false }),
        };
        let decoded = Command::decode(&encode_to_vec(&cmd)).expect("decodes");
        assert_eq!(decoded, cmd);
    }

    #[test]
    fn regions_on_the_wire() {
        let cmd = Command {
            id: 0,
            source: Region::Dome,
            target: Region::Body,
            data: CommandData::Led(LedCommand::default()),
        };
        assert_eq!(hex::encode(encode_to_vec(&cmd)), "100118022200");
    }

    #[test]
    fn empty_payload_is_missing_variant() {
        assert_eq!(Command::decode(&[]), Err(DecodeError::MissingVariant));
    }

    #[test]
    fn garbage_fails_decode() {
        assert!(Command::decode(&[0xFF, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        // Field 9, varint wire type.
        assert_eq!(
            Command::decode(&[0x48, 0x01]),
            Err(DecodeError::UnknownField { field: 9 })
        );
    }

    #[test]
    fn unknown_region_is_rejected() {
        // source = 9
        assert_eq!(
            Command::decode(&[0x10, 0x09, 0x22, 0x00]),
            Err(DecodeError::InvalidEnum { field: 2, value: 9 })
        );
    }

    #[test]
    fn truncated_sub_message_is_rejected() {
        // Led variant claiming 6 body bytes with only 2 present.
        assert_eq!(Command::decode(&[0x22, 0x06, 0x08, 0x01]), Err(DecodeError::Truncated));
    }

    #[test]
    fn over_long_reason_fails_encode() {
        let cmd = Command {
            id: 1,
            source: Region::Unspecified,
            target: Region::Unspecified,
            data: CommandData::Ack(AckCommand {
                acknowledged: false,
                reason: "x".repeat(MAX_REASON_LEN + 1),
            }),
        };
        let mut buf = [0u8; MAX_PAYLOAD];
        assert_eq!(cmd.encode(&mut buf), Err(EncodeError::ReasonTooLong { len: 64 }));
    }

    #[test]
    fn tiny_buffer_fails_encode() {
        let cmd = Command {
            id: u32::MAX,
            source: Region::Dome,
            target: Region::Body,
            data: CommandData::Move(MoveCommand {
                target: Actuator::DomeRotation,
                x: u32::MAX,
                y: u32::MAX,
                z: u32::MAX,
            }),
        };
        let mut buf = [0u8; 4];
        assert_eq!(cmd.encode(&mut buf), Err(EncodeError::BufferTooSmall));
    }

    #[test]
    fn last_variant_wins_on_repeat() {
        // led {} followed by sound {}: decoder keeps the sound variant.
        let decoded = Command::decode(&[0x22, 0x00, 0x2A, 0x00]).expect("decodes");
        assert_eq!(decoded.data, CommandData::Sound(SoundCommand::default()));
    }
}

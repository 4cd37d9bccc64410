//! Property-based tests for the command codec and the deframer.
//!
//! These verify the round-trip and resynchronisation properties for ALL
//! valid inputs, not just specific examples. Uses proptest to generate
//! arbitrary commands and hostile byte streams.

use bytes::BytesMut;
use droidlink_proto::{
    Actuator, AckCommand, Command, CommandData, Deframer, LedCommand, MAX_PAYLOAD, MoveCommand,
    Region, SoundCommand, command::MAX_REASON_LEN, encode_frame,
};
use proptest::prelude::*;

/// Strategy for generating arbitrary regions
fn arbitrary_region() -> impl Strategy<Value = Region> {
    prop_oneof![Just(Region::Unspecified), Just(Region::Dome), Just(Region::Body)]
}

/// Strategy for generating arbitrary actuators
fn arbitrary_actuator() -> impl Strategy<Value = Actuator> {
    prop_oneof![
        Just(Actuator::Unspecified),
        Just(Actuator::BodyNeck),
        Just(Actuator::DomeRotation),
    ]
}

/// Strategy for generating arbitrary payload variants
fn arbitrary_data() -> impl Strategy<Value = CommandData> {
    prop_oneof![
        (any::<u32>(), any::<u32>(), any::<u32>()).prop_map(|(start, end, duration)| {
            CommandData::Led(LedCommand { start, end, duration })
        }),
        (any::<u32>(), any::<bool>(), any::<bool>()).prop_map(|(id, play, sync_to_leds)| {
            CommandData::Sound(SoundCommand { id, play, sync_to_leds })
        }),
        (arbitrary_actuator(), any::<u32>(), any::<u32>(), any::<u32>())
            .prop_map(|(target, x, y, z)| CommandData::Move(MoveCommand { target, x, y, z })),
        (any::<bool>(), "[ -~]{0,63}").prop_map(|(acknowledged, reason)| {
            CommandData::Ack(AckCommand { acknowledged, reason })
        }),
    ]
}

/// Strategy for generating arbitrary commands
fn arbitrary_command() -> impl Strategy<Value = Command> {
    (any::<u32>(), arbitrary_region(), arbitrary_region(), arbitrary_data())
        .prop_map(|(id, source, target, data)| Command { id, source, target, data })
}

fn encode_to_vec(cmd: &Command) -> Vec<u8> {
    let mut buf = [0u8; MAX_PAYLOAD];
    let len = cmd.encode(&mut buf).expect("every generated command fits the payload buffer");
    buf[..len].to_vec()
}

#[test]
fn prop_codec_round_trip() {
    proptest!(|(cmd in arbitrary_command())| {
        let payload = encode_to_vec(&cmd);
        prop_assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds frame capacity");

        let decoded = Command::decode(&payload).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity, variant tag included
        prop_assert_eq!(decoded, cmd);
    });
}

#[test]
fn prop_reason_cap_is_enforced() {
    proptest!(|(len in (MAX_REASON_LEN + 1)..256usize)| {
        let cmd = Command {
            id: 1,
            source: Region::Dome,
            target: Region::Body,
            data: CommandData::Ack(AckCommand {
                acknowledged: false,
                reason: "r".repeat(len),
            }),
        };
        let mut buf = [0u8; MAX_PAYLOAD];
        prop_assert!(cmd.encode(&mut buf).is_err());
    });
}

#[test]
fn prop_decode_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..MAX_PAYLOAD))| {
        // PROPERTY: Arbitrary payload bytes either decode or error, never panic
        let _ = Command::decode(&bytes);
    });
}

#[test]
fn prop_deframer_recovers_framed_payloads() {
    proptest!(|(
        payloads in prop::collection::vec(
            prop::collection::vec(any::<u8>(), 0..MAX_PAYLOAD),
            1..8,
        ),
        noise in prop::collection::vec(
            any::<u8>().prop_filter("inter-frame noise, not START", |b| *b != 0x7E),
            0..32,
        ),
    )| {
        // Leading line noise (anything but START), then well-formed frames
        // back to back: the deframer discards the noise while hunting for
        // START and then delivers every payload intact.
        let mut wire = noise;
        for payload in &payloads {
            encode_frame(payload, &mut wire).expect("payload fits");
        }

        let mut deframer = Deframer::new();
        let mut delivered = Vec::new();
        for &byte in &wire {
            if let Ok(Some(payload)) = deframer.push(byte) {
                delivered.push(payload.to_vec());
            }
        }

        // PROPERTY: Nothing lost, nothing reordered, nothing invented
        prop_assert_eq!(&delivered[..], &payloads[..]);
    });
}

#[test]
fn prop_deframer_never_delivers_bad_crc() {
    proptest!(|(
        payload in prop::collection::vec(any::<u8>(), 0..MAX_PAYLOAD),
        flip in 0..8usize,
    )| {
        let mut wire = BytesMut::new();
        encode_frame(&payload, &mut wire).expect("payload fits");
        let mut wire = wire.to_vec();
        let crc_index = wire.len() - 1;
        wire[crc_index] ^= 1 << flip;

        let mut deframer = Deframer::new();
        for &byte in &wire {
            if let Ok(Some(delivered)) = deframer.push(byte) {
                // A flipped CRC byte must never yield this frame's payload.
                prop_assert_ne!(delivered, &payload[..]);
            }
        }
    });
}

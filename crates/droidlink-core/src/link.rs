//! Reliable command link over a byte stream.
//!
//! [`Link`] combines the frame parser, the schema codec, the recent-message
//! windows and the outstanding-acknowledgement table into the point-to-point
//! reliability engine:
//!
//! - outbound commands are framed, written, and tracked until the peer
//!   acknowledges them, with timeout-driven retransmission up to a bounded
//!   retry count;
//! - inbound frames are deduplicated against a recent-id window,
//!   acknowledged (every copy, including duplicates), and dispatched to the
//!   injected per-variant handlers at most once per id;
//! - NACKs trigger an immediate resend that counts against the same retry
//!   cap as a timeout-driven one.
//!
//! The link is non-reentrant: handlers run synchronously from
//! [`Link::process_queue`] and must not call back into the link. Time comes
//! exclusively from the injected timestamp provider.

use std::collections::HashMap;

use droidlink_proto::{
    Actuator, AckCommand, Command, CommandData, Deframer, LedCommand, MAX_PAYLOAD, MoveCommand,
    Region, SoundCommand, command::MAX_REASON_LEN, encode_frame, frame::OVERHEAD,
};
use tracing::{debug, trace, warn};

use crate::{
    clock::{TimestampProvider, monotonic_provider},
    error::SendError,
    stream::ByteStream,
    window::RecentWindow,
};

/// Default acknowledgement timeout in milliseconds. Also bounds one
/// [`Link::process_queue`] drain pass.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 1000;

/// Default retransmission cap per message.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Region identity stamped as `source` on every locally created
    /// command.
    pub region: Region,
    /// Milliseconds without an ACK before a message is retransmitted;
    /// doubles as the wall-time budget of one inbound drain pass.
    pub message_timeout_ms: u64,
    /// Retransmissions allowed per message before it is abandoned.
    pub max_retries: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            region: Region::Unspecified,
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Retransmission state of one unacknowledged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingEntry {
    /// Timestamp of the most recent transmission attempt.
    pub last_attempt_ms: u64,
    /// Retransmissions performed so far (0 after the first send).
    pub retries: u32,
}

type Handler<T> = Box<dyn FnMut(&T)>;

/// Reliable, acknowledged command link over a non-blocking byte stream.
///
/// Single-threaded and non-reentrant: the host must not call [`Link::send`]
/// or [`Link::process_queue`] from within a handler.
///
/// # Invariants
///
/// - Every id in the outstanding table has its payload live in the sent
///   window (retransmission never lacks a source).
/// - A handler runs at most once per distinct inbound id while that id is
///   in the received window; every inbound copy is ACKed regardless.
pub struct Link<S> {
    stream: S,
    config: LinkConfig,
    now: TimestampProvider,
    deframer: Deframer,
    sent: RecentWindow<Command>,
    received: RecentWindow<Command>,
    outstanding: HashMap<u32, OutstandingEntry>,
    on_led: Option<Handler<LedCommand>>,
    on_sound: Option<Handler<SoundCommand>>,
    on_move: Option<Handler<MoveCommand>>,
}

impl<S: ByteStream> Link<S> {
    /// Create a link with the default configuration (unspecified region,
    /// 1000 ms timeout, 3 retries).
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, LinkConfig::default())
    }

    /// Create a link with an explicit configuration.
    pub fn with_config(stream: S, config: LinkConfig) -> Self {
        Self {
            stream,
            config,
            now: monotonic_provider(),
            deframer: Deframer::new(),
            sent: RecentWindow::new(),
            received: RecentWindow::new(),
            outstanding: HashMap::new(),
            on_led: None,
            on_sound: None,
            on_move: None,
        }
    }

    /// Replace the timestamp provider (milliseconds, monotonic
    /// non-decreasing). Command ids and retry timing derive from it.
    pub fn set_timestamp_provider(&mut self, provider: impl FnMut() -> u64 + 'static) {
        self.now = Box::new(provider);
    }

    /// Install the LED command handler.
    pub fn set_led_handler(&mut self, handler: impl FnMut(&LedCommand) + 'static) {
        self.on_led = Some(Box::new(handler));
    }

    /// Install the sound command handler.
    pub fn set_sound_handler(&mut self, handler: impl FnMut(&SoundCommand) + 'static) {
        self.on_sound = Some(Box::new(handler));
    }

    /// Install the movement command handler.
    pub fn set_movement_handler(&mut self, handler: impl FnMut(&MoveCommand) + 'static) {
        self.on_move = Some(Box::new(handler));
    }

    /// Build an LED command addressed to `target`, with a fresh id from the
    /// timestamp provider and this link's region as source.
    pub fn led_command(&mut self, target: Region, start: u32, end: u32, duration: u32) -> Command {
        Command {
            id: (self.now)() as u32,
            source: self.config.region,
            target,
            data: CommandData::Led(LedCommand { start, end, duration }),
        }
    }

    /// Build a sound command addressed to `target`.
    pub fn sound_command(
        &mut self,
        target: Region,
        sound_id: u32,
        play: bool,
        sync_to_leds: bool,
    ) -> Command {
        Command {
            id: (self.now)() as u32,
            source: self.config.region,
            target,
            data: CommandData::Sound(SoundCommand { id: sound_id, play, sync_to_leds }),
        }
    }

    /// Build a movement command addressed to `target`.
    pub fn move_command(
        &mut self,
        target: Region,
        actuator: Actuator,
        x: u32,
        y: u32,
        z: u32,
    ) -> Command {
        Command {
            id: (self.now)() as u32,
            source: self.config.region,
            target,
            data: CommandData::Move(MoveCommand { target: actuator, x, y, z }),
        }
    }

    /// Send a command and track it until acknowledged.
    ///
    /// The command is recorded in the sent window and the outstanding table
    /// before the frame is written, so a failed write leaves the message
    /// eligible for the next retry sweep.
    ///
    /// # Errors
    ///
    /// - [`SendError::Encode`]: the command did not fit the payload buffer;
    ///   nothing was recorded.
    /// - [`SendError::StreamWrite`]: the stream rejected the frame; the
    ///   sent-window and outstanding entries are retained.
    pub fn send(&mut self, cmd: &Command) -> Result<(), SendError> {
        let mut payload = [0u8; MAX_PAYLOAD];
        let len = cmd.encode(&mut payload)?;

        self.record_sent(cmd);
        let now = (self.now)();
        self.outstanding.insert(cmd.id, OutstandingEntry { last_attempt_ms: now, retries: 0 });

        debug!(id = cmd.id, len, "sending command");
        self.write_frame(&payload[..len])
    }

    /// Send a positive acknowledgement for `id` to `target`.
    ///
    /// Replies are written on a wire-only path: they are recorded in the
    /// sent window but never tracked as outstanding, since peers do not
    /// acknowledge acknowledgements.
    pub fn send_ack(&mut self, id: u32, target: Region) -> Result<(), SendError> {
        let ack = AckCommand { acknowledged: true, reason: String::new() };
        self.send_reply(id, target, ack)
    }

    /// Send a negative acknowledgement for `id` to `target`, asking the
    /// peer to retransmit. The reason is truncated to
    /// [`MAX_REASON_LEN`] bytes on a character boundary.
    ///
    /// The engine never emits NACKs on its own; corrupt frames and decode
    /// failures are dropped silently and recovered by the sender's retry
    /// sweep.
    pub fn send_nack(&mut self, id: u32, target: Region, reason: &str) -> Result<(), SendError> {
        let ack = AckCommand { acknowledged: false, reason: truncate_reason(reason) };
        self.send_reply(id, target, ack)
    }

    /// Drain inbound bytes and run the retry sweep.
    ///
    /// Returns `true` when a complete frame was delivered this call. The
    /// drain stops after one frame, when the stream runs dry, on a framing
    /// error (parser resynchronises on the next START byte), or when the
    /// wall-time budget (= message timeout) is exhausted; a partial frame
    /// persists into the next call.
    pub fn process_queue(&mut self) -> bool {
        let delivered = self.read_frame();
        self.retry_sweep();
        delivered
    }

    /// Region identity of this link.
    #[must_use]
    pub fn region(&self) -> Region {
        self.config.region
    }

    /// Configured acknowledgement timeout in milliseconds.
    #[must_use]
    pub fn message_timeout_ms(&self) -> u64 {
        self.config.message_timeout_ms
    }

    /// Configured retransmission cap.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Window of recently sent commands (replies included).
    #[must_use]
    pub fn sent_window(&self) -> &RecentWindow<Command> {
        &self.sent
    }

    /// Window of recently received commands, as used for dedup.
    #[must_use]
    pub fn received_window(&self) -> &RecentWindow<Command> {
        &self.received
    }

    /// Number of messages awaiting acknowledgement.
    #[must_use]
    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// Retransmission state for an unacknowledged message.
    #[must_use]
    pub fn outstanding(&self, id: u32) -> Option<OutstandingEntry> {
        self.outstanding.get(&id).copied()
    }

    /// Ids of all messages awaiting acknowledgement.
    pub fn outstanding_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.outstanding.keys().copied()
    }

    /// Record an outbound command in the sent window, releasing the
    /// outstanding entry of whatever the window evicted: a message whose
    /// payload is gone can never be retransmitted.
    fn record_sent(&mut self, cmd: &Command) {
        if let Some(evicted) = self.sent.add(cmd.clone()) {
            if self.outstanding.remove(&evicted.id).is_some() {
                debug!(id = evicted.id, "sent window evicted an unacknowledged message");
            }
        }
    }

    fn send_reply(&mut self, id: u32, target: Region, ack: AckCommand) -> Result<(), SendError> {
        let cmd = Command {
            id,
            source: self.config.region,
            target,
            data: CommandData::Ack(ack),
        };
        let mut payload = [0u8; MAX_PAYLOAD];
        let len = cmd.encode(&mut payload)?;
        self.record_sent(&cmd);
        self.write_frame(&payload[..len])
    }

    /// Frame a payload and write it in one pass.
    fn write_frame(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let mut frame = [0u8; MAX_PAYLOAD + OVERHEAD];
        let total = payload.len() + OVERHEAD;
        // The payload came out of a MAX_PAYLOAD-sized buffer, so framing
        // cannot fail or overrun here.
        let mut cursor = &mut frame[..];
        if encode_frame(payload, &mut cursor).is_err() {
            return Err(SendError::StreamWrite);
        }

        if self.stream.write(&frame[..total]) == total {
            Ok(())
        } else {
            debug!("stream write failed, message left for the retry sweep");
            Err(SendError::StreamWrite)
        }
    }

    /// Pull bytes through the deframer until one frame is delivered, the
    /// stream runs dry, a framing error resets the parser, or the per-call
    /// wall budget is spent.
    fn read_frame(&mut self) -> bool {
        let entry_ms = (self.now)();
        while self.stream.available() > 0 {
            if (self.now)().saturating_sub(entry_ms) >= self.config.message_timeout_ms {
                trace!("drain budget exhausted, resuming next call");
                break;
            }
            let Some(byte) = self.stream.read() else {
                break;
            };
            match self.deframer.push(byte) {
                Ok(None) => {},
                Ok(Some(payload)) => {
                    let mut buf = [0u8; MAX_PAYLOAD];
                    let len = payload.len();
                    buf[..len].copy_from_slice(payload);
                    self.accept_payload(&buf[..len]);
                    return true;
                },
                Err(err) => {
                    warn!(%err, "framing error, resynchronising");
                    return false;
                },
            }
        }
        false
    }

    /// Decode one framed payload and dispatch it. Undecodable payloads are
    /// dropped silently; the sender's retry sweep covers recovery.
    fn accept_payload(&mut self, payload: &[u8]) {
        match Command::decode(payload) {
            Ok(msg) => {
                trace!(id = msg.id, "frame delivered");
                self.dispatch(msg);
            },
            Err(err) => {
                warn!(%err, "dropping undecodable payload");
            },
        }
    }

    /// Route one decoded inbound command.
    ///
    /// ACK/NACK replies feed the reliability engine and are never
    /// dispatched or deduplicated. Everything else is ACKed on every copy
    /// and handed to its handler exactly once per id.
    fn dispatch(&mut self, msg: Command) {
        if let CommandData::Ack(ack) = &msg.data {
            if ack.acknowledged {
                self.handle_ack(msg.id);
            } else {
                self.handle_nack(msg.id);
            }
            return;
        }

        if self.received.contains(msg.id) {
            debug!(id = msg.id, "duplicate inbound, re-acknowledging");
            self.reply_ack(msg.id, msg.source);
            return;
        }

        let id = msg.id;
        let source = msg.source;
        self.received.add(msg.clone());
        self.reply_ack(id, source);

        match &msg.data {
            CommandData::Led(led) => {
                if let Some(handler) = self.on_led.as_mut() {
                    handler(led);
                }
            },
            CommandData::Sound(sound) => {
                if let Some(handler) = self.on_sound.as_mut() {
                    handler(sound);
                }
            },
            CommandData::Move(mv) => {
                if let Some(handler) = self.on_move.as_mut() {
                    handler(mv);
                }
            },
            CommandData::Ack(_) => {},
        }
    }

    fn reply_ack(&mut self, id: u32, target: Region) {
        if let Err(err) = self.send_ack(id, target) {
            debug!(id, %err, "ack write failed");
        }
    }

    /// Peer confirmed receipt: stop tracking. The sent-window record stays
    /// for inspection and duplicate suppression of our own echo.
    fn handle_ack(&mut self, id: u32) {
        if self.outstanding.remove(&id).is_some() {
            debug!(id, "acknowledged");
        }
    }

    /// Peer asked for a retransmission. Only honoured while the message is
    /// still tracked and its payload is still in the sent window; the
    /// resend counts against the retry cap exactly like a timeout-driven
    /// one.
    fn handle_nack(&mut self, id: u32) {
        if self.outstanding.contains_key(&id) && self.sent.contains(id) {
            debug!(id, "negative acknowledgement, retransmitting");
            self.resend(id);
        }
    }

    /// Retransmit overdue messages and retire those past the retry cap.
    fn retry_sweep(&mut self) {
        let now = (self.now)();
        // The table mutates mid-pass (resend refreshes entries), so sweep a
        // snapshot.
        let entries: Vec<(u32, OutstandingEntry)> =
            self.outstanding.iter().map(|(id, entry)| (*id, *entry)).collect();

        for (id, entry) in entries {
            let overdue = now.saturating_sub(entry.last_attempt_ms) >= self.config.message_timeout_ms;
            if overdue && entry.retries < self.config.max_retries {
                if self.sent.contains(id) {
                    self.resend(id);
                } else {
                    // Payload evicted; nothing left to retransmit.
                    self.outstanding.remove(&id);
                }
            } else if entry.retries >= self.config.max_retries {
                debug!(id, "retry cap reached, abandoning message");
                self.outstanding.remove(&id);
            }
        }
    }

    /// Refresh the outstanding entry and rewrite the frame. Does not
    /// re-record the message: the sent window already holds it and the
    /// retry count must survive.
    fn resend(&mut self, id: u32) {
        let Some(cmd) = self.sent.get(id).cloned() else {
            self.outstanding.remove(&id);
            return;
        };

        let now = (self.now)();
        if let Some(entry) = self.outstanding.get_mut(&id) {
            entry.last_attempt_ms = now;
            entry.retries += 1;
            debug!(id, retries = entry.retries, "retransmitting");
        }

        let mut payload = [0u8; MAX_PAYLOAD];
        match cmd.encode(&mut payload) {
            Ok(len) => {
                // A failed write leaves the entry for the next sweep.
                let _ = self.write_frame(&payload[..len]);
            },
            Err(err) => {
                warn!(id, %err, "retransmission failed to encode");
            },
        }
    }
}

/// Cap a NACK reason at [`MAX_REASON_LEN`] bytes without splitting a
/// character.
fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_REASON_LEN {
        return reason.to_owned();
    }
    let mut cut = MAX_REASON_LEN;
    while !reason.is_char_boundary(cut) {
        cut -= 1;
    }
    reason[..cut].to_owned()
}

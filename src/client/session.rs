//! Renderer-side protocol state
//!
//! `ClientSession` is what a remote renderer keeps per connection: it applies
//! server messages as they arrive, answers heartbeats, and hands out poses for
//! the render loop. It has no socket of its own; the embedding transport feeds
//! it text frames and sends back whatever it returns.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::ws::protocol::{decode_server, encode, ClientMsg, ServerMsg, Side};

use super::buffer::{BufferEntry, Pose, ReconstructionBuffer};

/// Where the renderer is in the connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPhase {
    /// Connected, waiting for `init`
    Connecting,
    /// Seated and receiving snapshots
    Playing,
    /// Match was full
    Rejected,
    /// Match torn down, with the server's reason
    Ended(String),
}

/// Field geometry announced by the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldInfo {
    pub width: f32,
    pub height: f32,
}

/// Shared between the message-arrival handler and the render loop
pub type SharedClientSession = Arc<Mutex<ClientSession>>;

#[derive(Debug, Clone)]
pub struct ClientSession {
    phase: ClientPhase,
    side: Option<Side>,
    field: Option<FieldInfo>,
    buffer: ReconstructionBuffer,
    dropped_snapshots: u64,
}

impl ClientSession {
    /// `default_offset_ms` is used until the server announces its own offset
    pub fn new(default_offset_ms: f64) -> Self {
        Self {
            phase: ClientPhase::Connecting,
            side: None,
            field: None,
            buffer: ReconstructionBuffer::new(default_offset_ms),
            dropped_snapshots: 0,
        }
    }

    pub fn shared(default_offset_ms: f64) -> SharedClientSession {
        Arc::new(Mutex::new(Self::new(default_offset_ms)))
    }

    pub fn phase(&self) -> &ClientPhase {
        &self.phase
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn field(&self) -> Option<FieldInfo> {
        self.field
    }

    pub fn buffer(&self) -> &ReconstructionBuffer {
        &self.buffer
    }

    /// Snapshots refused as stale or out of order
    pub fn dropped_snapshots(&self) -> u64 {
        self.dropped_snapshots
    }

    /// Apply a server message received at local time `now_ms`.
    /// Returns the reply to send, if any.
    pub fn handle_message(&mut self, msg: ServerMsg, now_ms: f64) -> Option<ClientMsg> {
        match msg {
            ServerMsg::Init {
                side,
                width,
                height,
                lag_comp_ms,
            } => {
                self.side = Some(side);
                self.field = Some(FieldInfo { width, height });
                self.buffer = ReconstructionBuffer::new(lag_comp_ms as f64);
                self.phase = ClientPhase::Playing;
                None
            }
            ServerMsg::State { .. } => {
                if let Some(entry) = BufferEntry::from_state(&msg, now_ms) {
                    if let Err(reason) = self.buffer.ingest(entry) {
                        self.dropped_snapshots += 1;
                        debug!(seq = entry.seq, reason = ?reason, "Snapshot dropped");
                    }
                }
                None
            }
            ServerMsg::Ping { t } => Some(ClientMsg::Pong { t }),
            ServerMsg::Full => {
                self.phase = ClientPhase::Rejected;
                None
            }
            ServerMsg::End { reason } => {
                self.phase = ClientPhase::Ended(reason);
                self.buffer.clear();
                None
            }
        }
    }

    /// Text-frame entry point: unknown payloads are ignored, replies come back encoded
    pub fn handle_text(&mut self, text: &str, now_ms: f64) -> Option<String> {
        let msg = decode_server(text)?;
        let reply = self.handle_message(msg, now_ms)?;
        encode(&reply).ok()
    }

    /// Pose for a frame drawn at local time `now_ms`
    pub fn pose(&self, now_ms: f64) -> Option<Pose> {
        self.buffer.sample(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{BallPos, PaddleState};

    fn state(seq: u64, x: f32) -> ServerMsg {
        ServerMsg::State {
            seq,
            server_time: 0,
            ball: BallPos { x, y: 0.0 },
            left: Some(PaddleState { y: 0.0, score: 0 }),
            right: None,
        }
    }

    #[test]
    fn init_sets_side_field_and_offset() {
        let mut session = ClientSession::new(50.0);
        session.handle_text(
            r#"{"type":"init","side":"right","width":800,"height":500,"lagCompMs":120}"#,
            0.0,
        );
        assert_eq!(session.phase(), &ClientPhase::Playing);
        assert_eq!(session.side(), Some(Side::Right));
        assert_eq!(
            session.field(),
            Some(FieldInfo {
                width: 800.0,
                height: 500.0
            })
        );
        assert_eq!(session.buffer().render_offset_ms(), 120.0);
    }

    #[test]
    fn ping_is_answered_with_matching_pong() {
        let mut session = ClientSession::new(100.0);
        let reply = session.handle_text(r#"{"type":"ping","t":987}"#, 0.0);
        assert_eq!(reply.as_deref(), Some(r#"{"type":"pong","t":987}"#));
    }

    #[test]
    fn snapshots_are_stamped_with_arrival_time() {
        let mut session = ClientSession::new(100.0);
        session.handle_message(state(1, 0.0), 1_000.0);
        session.handle_message(state(2, 10.0), 1_016.0);
        session.handle_message(state(2, 99.0), 1_020.0);
        assert_eq!(session.dropped_snapshots(), 1);

        let pose = session.pose(1_108.0).unwrap();
        assert!(pose.interpolated);
        assert!((pose.ball.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn full_and_end_update_phase() {
        let mut session = ClientSession::new(100.0);
        session.handle_text(r#"{"type":"full"}"#, 0.0);
        assert_eq!(session.phase(), &ClientPhase::Rejected);

        let mut session = ClientSession::new(100.0);
        session.handle_message(state(1, 0.0), 0.0);
        session.handle_text(r#"{"type":"end","reason":"player_left"}"#, 5.0);
        assert_eq!(
            session.phase(),
            &ClientPhase::Ended("player_left".to_string())
        );
        assert!(session.buffer().is_empty());
    }

    #[test]
    fn garbage_is_ignored() {
        let mut session = ClientSession::new(100.0);
        assert_eq!(session.handle_text("{oops", 0.0), None);
        assert_eq!(session.handle_text(r#"{"type":"bogus"}"#, 0.0), None);
        assert_eq!(session.phase(), &ClientPhase::Connecting);
    }

    #[test]
    fn shared_session_crosses_threads() {
        let shared = ClientSession::shared(0.0);
        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for seq in 1..=50u64 {
                    shared
                        .lock()
                        .handle_message(state(seq, seq as f32), seq as f64 * 10.0);
                }
            })
        };
        writer.join().unwrap();
        let pose = shared.lock().pose(255.0).unwrap();
        assert!((pose.ball.x - 25.5).abs() < 1e-4);
    }
}

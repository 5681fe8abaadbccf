//! Session lifecycle and the match task
//!
//! One `GameSession` task owns the `MatchState`. Connections talk to it only
//! through `SessionHandle`, so every mutation (admission, intent updates, pongs,
//! teardown, ticks) is serialized on that task.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::util::time::unix_millis;
use crate::ws::protocol::{encode, ClientMsg, ServerMsg, Side};

use super::broadcast::{deliver, Broadcaster, OutboundTx, Payload};
use super::liveness::LivenessMonitor;
use super::physics::{FIELD_HEIGHT, FIELD_WIDTH};
use super::r#match::{Intent, MatchState};
use super::snapshot::{build_snapshot, SnapshotStats};

/// Why a connection went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Client closed the socket or the stream ended
    Closed,
    /// No pong within the heartbeat timeout
    Timeout,
    /// Transport error on the socket
    ProtocolError,
}

/// Reason carried by the `end` notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    PlayerLeft,
    ServerShutdown,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::PlayerLeft => "player_left",
            EndReason::ServerShutdown => "server_shutdown",
        }
    }
}

/// Admission failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    #[error("Match is full")]
    Full,

    #[error("Session is not running")]
    Closed,
}

/// Commands accepted by the session task
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        conn_id: Uuid,
        outbound: OutboundTx,
        reply: oneshot::Sender<Result<Side, AdmitError>>,
    },
    Message {
        conn_id: Uuid,
        msg: ClientMsg,
    },
    Leave {
        conn_id: Uuid,
        reason: LeaveReason,
    },
    Shutdown,
}

/// Summary published after every change, read by the health endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStatus {
    pub match_id: Uuid,
    pub participants: usize,
    pub seq: u64,
    pub left_score: Option<u32>,
    pub right_score: Option<u32>,
}

/// Timing knobs for a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub tick_period: std::time::Duration,
    pub heartbeat_interval: std::time::Duration,
    pub heartbeat_timeout: std::time::Duration,
    pub lag_comp_ms: u64,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_period: config.tick_period(),
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            lag_comp_ms: config.lag_comp_ms,
        }
    }
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Ask for a seat. On success the `init` message is already queued on `outbound`;
    /// on `Full` the `full` notice is queued and `outbound` is dropped.
    pub async fn join(&self, conn_id: Uuid, outbound: OutboundTx) -> Result<Side, AdmitError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Join {
                conn_id,
                outbound,
                reply,
            })
            .await
            .map_err(|_| AdmitError::Closed)?;
        rx.await.map_err(|_| AdmitError::Closed)?
    }

    /// Forward a decoded client message
    pub async fn submit(&self, conn_id: Uuid, msg: ClientMsg) -> bool {
        self.cmd_tx
            .send(SessionCommand::Message { conn_id, msg })
            .await
            .is_ok()
    }

    pub async fn leave(&self, conn_id: Uuid, reason: LeaveReason) {
        let _ = self
            .cmd_tx
            .send(SessionCommand::Leave { conn_id, reason })
            .await;
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

/// The authoritative match task
pub struct GameSession {
    settings: SessionSettings,
    state: MatchState,
    broadcaster: Broadcaster,
    liveness: LivenessMonitor,
    stats: SnapshotStats,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    status_tx: watch::Sender<SessionStatus>,
}

impl GameSession {
    pub fn new(settings: SessionSettings, seed: u64) -> (Self, SessionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let state = MatchState::new(seed);
        let (status_tx, status_rx) = watch::channel(SessionStatus {
            match_id: state.id,
            ..SessionStatus::default()
        });

        let session = Self {
            liveness: LivenessMonitor::new(settings.heartbeat_timeout),
            settings,
            state,
            broadcaster: Broadcaster::new(),
            stats: SnapshotStats::default(),
            cmd_rx,
            status_tx,
        };
        let handle = SessionHandle { cmd_tx, status_rx };
        (session, handle)
    }

    /// Run the tick and heartbeat schedulers until shutdown
    pub async fn run(mut self) {
        info!(
            match_id = %self.state.id,
            seed = self.state.seed,
            tick_ms = self.settings.tick_period.as_secs_f64() * 1000.0,
            "Session started"
        );

        let mut tick_interval = interval(self.settings.tick_period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_interval = interval(self.settings.heartbeat_interval);
        heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => self.on_tick(),
                _ = heartbeat_interval.tick() => self.on_heartbeat(Instant::now()),
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
            }
        }

        self.teardown(EndReason::ServerShutdown);
        info!("Session stopped");
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join {
                conn_id,
                outbound,
                reply,
            } => {
                let result = self.admit(conn_id, outbound);
                let _ = reply.send(result);
            }
            SessionCommand::Message { conn_id, msg } => self.apply_message(conn_id, msg),
            SessionCommand::Leave { conn_id, reason } => {
                self.remove(conn_id, reason);
            }
            SessionCommand::Shutdown => {}
        }
    }

    /// Seat a connection or turn it away with a `full` notice
    fn admit(&mut self, conn_id: Uuid, outbound: OutboundTx) -> Result<Side, AdmitError> {
        let Some(side) = self.state.add_participant(conn_id, Instant::now()) else {
            if let Ok(json) = encode(&ServerMsg::Full) {
                deliver(conn_id, &outbound, Payload::from(json));
            }
            warn!(
                conn_id = %conn_id,
                participants = self.state.participants.len(),
                "Match full, rejecting connection"
            );
            return Err(AdmitError::Full);
        };

        self.broadcaster.insert(conn_id, outbound);
        self.broadcaster.send(
            conn_id,
            &ServerMsg::Init {
                side,
                width: FIELD_WIDTH,
                height: FIELD_HEIGHT,
                lag_comp_ms: self.settings.lag_comp_ms,
            },
        );

        info!(
            match_id = %self.state.id,
            conn_id = %conn_id,
            side = side.as_str(),
            participants = self.state.participants.len(),
            "Participant joined"
        );
        self.publish_status();
        Ok(side)
    }

    fn apply_message(&mut self, conn_id: Uuid, msg: ClientMsg) {
        let known = match msg {
            ClientMsg::Input { up, down } => {
                self.state.set_intent(conn_id, Intent::Flags { up, down })
            }
            ClientMsg::TouchMove { desired_y } => {
                self.state.set_intent(conn_id, Intent::Target(desired_y))
            }
            ClientMsg::TouchEnd => self.state.set_intent(conn_id, Intent::default()),
            ClientMsg::Pong { t } => {
                let known = self.state.record_pong(conn_id, Instant::now());
                if known {
                    debug!(
                        conn_id = %conn_id,
                        rtt_ms = unix_millis().saturating_sub(t),
                        "Pong"
                    );
                }
                known
            }
        };

        if !known {
            debug!(conn_id = %conn_id, "Message from unseated connection ignored");
        }
    }

    /// Any participant leaving ends the whole match
    fn remove(&mut self, conn_id: Uuid, reason: LeaveReason) -> bool {
        let Some(participant) = self.state.participant(conn_id) else {
            return false;
        };

        info!(
            match_id = %self.state.id,
            conn_id = %conn_id,
            side = participant.side.as_str(),
            reason = ?reason,
            "Participant left, tearing down match"
        );
        self.teardown(EndReason::PlayerLeft);
        true
    }

    /// Notify and close every connection, then arm a fresh match
    fn teardown(&mut self, reason: EndReason) {
        if !self.broadcaster.is_empty() {
            self.broadcaster.broadcast(&ServerMsg::End {
                reason: reason.as_str().to_string(),
            });
        }
        self.broadcaster.close_all();

        if !self.state.participants.is_empty() {
            let duration = chrono::Utc::now() - self.state.created_at;
            info!(
                match_id = %self.state.id,
                reason = reason.as_str(),
                duration_secs = duration.num_seconds(),
                ticks = self.state.seq,
                snapshots = self.stats.total_snapshots,
                avg_snapshot_bytes = self.stats.avg_bytes(),
                left_score = ?self.state.score(Side::Left),
                right_score = ?self.state.score(Side::Right),
                "Match ended"
            );
        }

        self.state.reset();
        self.stats = SnapshotStats::default();
        self.publish_status();
    }

    fn on_tick(&mut self) {
        let report = self.state.step();
        if let Some(side) = report.scored {
            debug!(
                match_id = %self.state.id,
                side = side.as_str(),
                score = ?self.state.score(side),
                "Point scored"
            );
        }

        if !self.broadcaster.is_empty() {
            let snapshot = build_snapshot(&self.state, unix_millis());
            if let Some(bytes) = self.broadcaster.broadcast(&snapshot) {
                self.stats.record(bytes);
            }
        }
        self.publish_status();
    }

    fn on_heartbeat(&mut self, now: Instant) {
        let cycle = self.liveness.cycle(
            &self.state.participants,
            &self.broadcaster,
            now,
            unix_millis(),
        );

        for conn_id in &cycle.expired {
            warn!(
                conn_id = %conn_id,
                timeout_ms = self.liveness.timeout().as_millis() as u64,
                "Heartbeat timeout"
            );
            self.broadcaster.close(*conn_id);
        }
        if let Some(conn_id) = cycle.expired.first() {
            self.remove(*conn_id, LeaveReason::Timeout);
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(SessionStatus {
            match_id: self.state.id,
            participants: self.state.participants.len(),
            seq: self.state.seq,
            left_score: self.state.score(Side::Left),
            right_score: self.state.score(Side::Right),
        });
    }
}

//! Match state and the authoritative tick step

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;
use uuid::Uuid;

use crate::ws::protocol::Side;

use super::physics::{self, Ball};

/// Maximum number of participants in a match
pub const MAX_PARTICIPANTS: usize = 2;

/// Current paddle control mode. Last write wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// Discrete up/down flags
    Flags { up: bool, down: bool },
    /// Absolute target for the paddle center
    Target(f32),
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Flags {
            up: false,
            down: false,
        }
    }
}

/// A connected player (authoritative)
#[derive(Debug, Clone)]
pub struct Participant {
    pub conn_id: Uuid,
    pub side: Side,
    pub paddle_y: f32,
    pub score: u32,
    pub intent: Intent,
    pub last_pong: Instant,
}

impl Participant {
    pub fn new(conn_id: Uuid, side: Side, now: Instant) -> Self {
        Self {
            conn_id,
            side,
            paddle_y: physics::centered_paddle_y(),
            score: 0,
            intent: Intent::default(),
            last_pong: now,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub wall_bounce: bool,
    pub paddle_hit: Option<Side>,
    pub scored: Option<Side>,
}

/// Match state (owned by the session task)
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
    pub participants: Vec<Participant>,
    pub ball: Ball,
    pub rng: ChaCha8Rng,
}

impl MatchState {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let ball = Ball::serve_random(&mut rng);
        Self {
            id: Uuid::new_v4(),
            seed,
            created_at: Utc::now(),
            seq: 0,
            participants: Vec::with_capacity(MAX_PARTICIPANTS),
            ball,
            rng,
        }
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= MAX_PARTICIPANTS
    }

    /// First side nobody holds, left before right
    pub fn free_side(&self) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.participant_on(*side).is_none())
    }

    pub fn participant_on(&self, side: Side) -> Option<&Participant> {
        self.participants.iter().find(|p| p.side == side)
    }

    pub fn participant(&self, conn_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.conn_id == conn_id)
    }

    pub fn participant_mut(&mut self, conn_id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.conn_id == conn_id)
    }

    /// Seat a new participant on the first free side
    pub fn add_participant(&mut self, conn_id: Uuid, now: Instant) -> Option<Side> {
        if self.is_full() || self.participant(conn_id).is_some() {
            return None;
        }
        let side = self.free_side()?;
        self.participants.push(Participant::new(conn_id, side, now));
        Some(side)
    }

    pub fn set_intent(&mut self, conn_id: Uuid, intent: Intent) -> bool {
        match self.participant_mut(conn_id) {
            Some(p) => {
                p.intent = intent;
                true
            }
            None => false,
        }
    }

    pub fn record_pong(&mut self, conn_id: Uuid, now: Instant) -> bool {
        match self.participant_mut(conn_id) {
            Some(p) => {
                p.last_pong = now;
                true
            }
            None => false,
        }
    }

    pub fn score(&self, side: Side) -> Option<u32> {
        self.participant_on(side).map(|p| p.score)
    }

    /// Drop every participant and serve a fresh ball for the next pair
    pub fn reset(&mut self) {
        self.participants.clear();
        self.ball = Ball::serve_random(&mut self.rng);
        self.seq = 0;
        self.id = Uuid::new_v4();
        self.created_at = Utc::now();
    }

    /// Advance the simulation by one tick
    pub fn step(&mut self) -> TickReport {
        let mut report = TickReport::default();

        for p in self.participants.iter_mut() {
            p.paddle_y = match p.intent {
                Intent::Target(target) => physics::step_paddle_target(p.paddle_y, target),
                Intent::Flags { up, down } => physics::step_paddle_flags(p.paddle_y, up, down),
            };
        }

        physics::integrate(&mut self.ball);
        report.wall_bounce = physics::reflect_walls(&mut self.ball);

        for p in &self.participants {
            if physics::collide_paddle(&mut self.ball, p.side, p.paddle_y) {
                report.paddle_hit = Some(p.side);
                break;
            }
        }

        if let Some(scorer) = physics::goal_scored(&self.ball) {
            if let Some(p) = self.participants.iter_mut().find(|p| p.side == scorer) {
                p.score += 1;
            }
            self.ball = Ball::serve(&mut self.rng, scorer);
            report.scored = Some(scorer);
        }

        self.seq += 1;
        report
    }
}

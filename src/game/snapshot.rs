//! Snapshot building

use crate::ws::protocol::{BallPos, PaddleState, ServerMsg, Side};

use super::MatchState;

/// Build the post-tick snapshot. Unoccupied sides are sent as `null`.
pub fn build_snapshot(state: &MatchState, server_time: u64) -> ServerMsg {
    let paddle = |side: Side| {
        state.participant_on(side).map(|p| PaddleState {
            y: p.paddle_y,
            score: p.score,
        })
    };

    ServerMsg::State {
        seq: state.seq,
        server_time,
        ball: BallPos {
            x: state.ball.x,
            y: state.ball.y,
        },
        left: paddle(Side::Left),
        right: paddle(Side::Right),
    }
}

/// Snapshot volume counters, logged when a match is torn down
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;
    }

    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.total_snapshots).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;
    use uuid::Uuid;

    #[test]
    fn snapshot_mirrors_state_and_omits_empty_side() {
        let mut state = MatchState::new(1);
        state.add_participant(Uuid::new_v4(), Instant::now());
        state.participants[0].score = 4;
        state.step();

        let msg = build_snapshot(&state, 99);
        match &msg {
            ServerMsg::State {
                seq,
                server_time,
                ball,
                left,
                right,
            } => {
                assert_eq!(*seq, 1);
                assert_eq!(*server_time, 99);
                assert_eq!(ball.x, state.ball.x);
                assert_eq!(left.map(|p| p.score), Some(4));
                assert!(right.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(msg.paddle(Side::Left).map(|p| p.y), Some(state.participants[0].paddle_y));
    }

    #[test]
    fn stats_average() {
        let mut stats = SnapshotStats::default();
        assert_eq!(stats.avg_bytes(), 0);
        stats.record(100);
        stats.record(200);
        assert_eq!(stats.avg_bytes(), 150);
    }
}

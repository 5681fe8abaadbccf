//! Heartbeat-based detection of dead connections

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

use super::broadcast::Broadcaster;
use super::r#match::Participant;

/// Outcome of one heartbeat cycle
#[derive(Debug, Default, PartialEq)]
pub struct HeartbeatCycle {
    /// Participants whose last pong is older than the timeout
    pub expired: Vec<Uuid>,
    /// Participants that were pinged
    pub pinged: usize,
}

/// Pings participants and picks out the ones that stopped answering
#[derive(Debug, Clone, Copy)]
pub struct LivenessMonitor {
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self, participant: &Participant, now: Instant) -> bool {
        now.saturating_duration_since(participant.last_pong) > self.timeout
    }

    /// Run one cycle: expired participants are returned for termination,
    /// everyone else receives a timestamped ping.
    pub fn cycle(
        &self,
        participants: &[Participant],
        broadcaster: &Broadcaster,
        now: Instant,
        server_time: u64,
    ) -> HeartbeatCycle {
        let mut cycle = HeartbeatCycle::default();
        let ping = ServerMsg::Ping { t: server_time };
        for p in participants {
            if self.is_expired(p, now) {
                cycle.expired.push(p.conn_id);
            } else {
                broadcaster.send(p.conn_id, &ping);
                cycle.pinged += 1;
            }
        }
        cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::broadcast::outbound_channel;
    use crate::ws::protocol::Side;

    #[test]
    fn silent_participant_expires_and_live_one_is_pinged() {
        let monitor = LivenessMonitor::new(Duration::from_secs(6));
        let start = Instant::now();
        let now = start + Duration::from_secs(10);

        let stale = Participant::new(Uuid::new_v4(), Side::Left, start);
        let fresh = Participant::new(Uuid::new_v4(), Side::Right, now - Duration::from_secs(1));

        let mut broadcaster = Broadcaster::new();
        let (tx_stale, mut rx_stale) = outbound_channel();
        let (tx_fresh, mut rx_fresh) = outbound_channel();
        broadcaster.insert(stale.conn_id, tx_stale);
        broadcaster.insert(fresh.conn_id, tx_fresh);

        let cycle = monitor.cycle(&[stale.clone(), fresh], &broadcaster, now, 1234);
        assert_eq!(cycle.expired, vec![stale.conn_id]);
        assert_eq!(cycle.pinged, 1);
        assert_eq!(&*rx_fresh.try_recv().unwrap(), r#"{"type":"ping","t":1234}"#);
        assert!(rx_stale.try_recv().is_err());
    }

    #[test]
    fn exactly_at_timeout_is_still_alive() {
        let monitor = LivenessMonitor::new(Duration::from_secs(6));
        let start = Instant::now();
        let p = Participant::new(Uuid::new_v4(), Side::Left, start);
        assert!(!monitor.is_expired(&p, start + Duration::from_secs(6)));
        assert!(monitor.is_expired(&p, start + Duration::from_millis(6_001)));
    }
}

//! Authoritative match simulation and session management

pub mod broadcast;
pub mod liveness;
pub mod r#match;
pub mod physics;
pub mod session;
pub mod snapshot;

pub use r#match::{Intent, MatchState, Participant};
pub use session::{
    AdmitError, GameSession, LeaveReason, SessionHandle, SessionSettings, SessionStatus,
};

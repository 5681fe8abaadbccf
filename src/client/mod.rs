//! Renderer-side reconstruction of the authoritative match

pub mod buffer;
pub mod session;

pub use buffer::{BufferEntry, Pose, ReconstructionBuffer};
pub use session::{ClientPhase, ClientSession, SharedClientSession};

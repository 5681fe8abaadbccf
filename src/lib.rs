//! Pong Arena - authoritative two-player pong over WebSockets
//!
//! The server side runs one match task that owns the simulation, ticks it at a
//! fixed rate and fans snapshots out to both participants. The `client` module
//! is the renderer-side counterpart: it buffers snapshots and reconstructs a
//! smooth pose slightly in the past.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;

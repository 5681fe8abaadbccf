//! Snapshot reconstruction buffer for remote renderers
//!
//! Snapshots are stamped with their local arrival time and kept for a bounded
//! window. A renderer samples the buffer at `now - render_offset`, which is
//! usually bracketed by two real snapshots, and gets a linearly interpolated
//! pose. When no pair brackets the requested time the newest snapshot is held.

use std::collections::VecDeque;

use crate::ws::protocol::{BallPos, PaddleState, ServerMsg};

/// How long snapshots are kept, in milliseconds
pub const DEFAULT_RETENTION_MS: f64 = 1_000.0;
/// Eviction never shrinks the buffer below this many entries
pub const MIN_RETAINED: usize = 2;

/// One buffered snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferEntry {
    /// Local arrival time in milliseconds
    pub time_ms: f64,
    pub seq: u64,
    pub ball: BallPos,
    pub left: Option<PaddleState>,
    pub right: Option<PaddleState>,
}

impl BufferEntry {
    /// Build an entry from a `state` message; other kinds yield `None`
    pub fn from_state(msg: &ServerMsg, time_ms: f64) -> Option<Self> {
        match msg {
            ServerMsg::State {
                seq,
                ball,
                left,
                right,
                ..
            } => Some(Self {
                time_ms,
                seq: *seq,
                ball: *ball,
                left: *left,
                right: *right,
            }),
            _ => None,
        }
    }
}

/// Reconstructed pose for one render frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub ball: BallPos,
    pub left: Option<PaddleState>,
    pub right: Option<PaddleState>,
    /// Blend factor between the bracketing snapshots, in `[0, 1]`
    pub alpha: f32,
    /// False when the newest snapshot was held instead of interpolated
    pub interpolated: bool,
}

/// Why `ingest` refused a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Sequence number not newer than the newest buffered one
    Stale,
    /// Arrival time earlier than the newest buffered one
    OutOfOrder,
}

#[derive(Debug, Clone)]
pub struct ReconstructionBuffer {
    entries: VecDeque<BufferEntry>,
    retention_ms: f64,
    render_offset_ms: f64,
}

impl ReconstructionBuffer {
    pub fn new(render_offset_ms: f64) -> Self {
        Self::with_retention(render_offset_ms, DEFAULT_RETENTION_MS)
    }

    pub fn with_retention(render_offset_ms: f64, retention_ms: f64) -> Self {
        Self {
            entries: VecDeque::new(),
            retention_ms,
            render_offset_ms,
        }
    }

    pub fn render_offset_ms(&self) -> f64 {
        self.render_offset_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest(&self) -> Option<&BufferEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a snapshot and evict entries older than the retention window
    pub fn ingest(&mut self, entry: BufferEntry) -> Result<(), Rejected> {
        if let Some(newest) = self.entries.back() {
            if entry.seq <= newest.seq {
                return Err(Rejected::Stale);
            }
            if entry.time_ms < newest.time_ms {
                return Err(Rejected::OutOfOrder);
            }
        }
        self.entries.push_back(entry);
        self.evict();
        Ok(())
    }

    fn evict(&mut self) {
        let Some(newest) = self.entries.back() else {
            return;
        };
        let cutoff = newest.time_ms - self.retention_ms;
        while self.entries.len() > MIN_RETAINED {
            match self.entries.front() {
                Some(oldest) if oldest.time_ms < cutoff => {
                    self.entries.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Pose to draw at wall-clock `now_ms`, rendered `render_offset_ms` in the past
    pub fn sample(&self, now_ms: f64) -> Option<Pose> {
        self.sample_at(now_ms - self.render_offset_ms)
    }

    /// Pose at an explicit render time
    pub fn sample_at(&self, render_time: f64) -> Option<Pose> {
        let newest = self.entries.back()?;

        let bracket = (1..self.entries.len()).rev().find_map(|i| {
            let prev = &self.entries[i - 1];
            let next = &self.entries[i];
            (prev.time_ms <= render_time && render_time <= next.time_ms).then_some((prev, next))
        });

        let Some((prev, next)) = bracket else {
            return Some(Pose {
                ball: newest.ball,
                left: newest.left,
                right: newest.right,
                alpha: 1.0,
                interpolated: false,
            });
        };

        let span = next.time_ms - prev.time_ms;
        let alpha = if span > 0.0 {
            ((render_time - prev.time_ms) / span).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        Some(Pose {
            ball: BallPos {
                x: lerp(prev.ball.x, next.ball.x, alpha),
                y: lerp(prev.ball.y, next.ball.y, alpha),
            },
            left: blend_paddle(prev.left, next.left, alpha),
            right: blend_paddle(prev.right, next.right, alpha),
            alpha,
            interpolated: true,
        })
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Positions blend, scores come from the newer snapshot. A side present in only
/// one of the two snapshots is taken from that snapshot as is.
fn blend_paddle(
    prev: Option<PaddleState>,
    next: Option<PaddleState>,
    alpha: f32,
) -> Option<PaddleState> {
    match (prev, next) {
        (Some(a), Some(b)) => Some(PaddleState {
            y: lerp(a.y, b.y, alpha),
            score: b.score,
        }),
        (None, Some(only)) | (Some(only), None) => Some(only),
        (None, None) => None,
    }
}

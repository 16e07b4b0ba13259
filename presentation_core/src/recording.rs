// Recording sessions: restart from the first scene with controls hidden, and report
// when the whole presentation plus a short tail has played.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One `play_for_recording` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSession {
    started_at: Timestamp,
    window_ms: u64,
}

impl RecordingSession {
    /// A session covering `total_duration_ms` of scenes followed by `tail_ms`.
    pub fn new(started_at: Timestamp, total_duration_ms: u64, tail_ms: u64) -> Self {
        RecordingSession {
            started_at,
            window_ms: total_duration_ms.saturating_add(tail_ms),
        }
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// How long the session lasts (milliseconds).
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn completes_at(&self) -> Timestamp {
        self.started_at.after(self.window_ms)
    }

    /// Milliseconds left at `now`.
    pub fn remaining_ms(&self, now: Timestamp) -> u64 {
        self.completes_at().since(now)
    }
}

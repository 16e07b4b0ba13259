// Scheduled tasks owned by the controller.
// A scheduler only ever reports expiry by task id; it never holds the controller.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Identity of one scheduled task. Never reused within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(id: u64) -> Self {
        TaskId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// What happens when a task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Move on to the next scene.
    Advance,
    /// The last scene's hold is over; start again from the first scene.
    LoopRestart,
}

/// A one-shot delayed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    id: TaskId,
    kind: TaskKind,
    scheduled_at: Timestamp,
    delay_ms: u64,
}

impl ScheduledTask {
    pub fn new(id: TaskId, kind: TaskKind, scheduled_at: Timestamp, delay_ms: u64) -> Self {
        ScheduledTask {
            id,
            kind,
            scheduled_at,
            delay_ms,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn scheduled_at(&self) -> Timestamp {
        self.scheduled_at
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn due_at(&self) -> Timestamp {
        self.scheduled_at.after(self.delay_ms)
    }
}

/// Platform timer facility used by the controller.
///
/// The controller calls `schedule` for every task it creates, `cancel` for
/// every task it abandons before expiry, and `completed` once a task has fired.
/// When a timer expires the host hands the task id back to
/// `PresentationController::fire`.
pub trait Scheduler {
    fn now(&self) -> Timestamp;

    fn schedule(&mut self, task: &ScheduledTask);

    fn cancel(&mut self, task: &ScheduledTask);

    fn completed(&mut self, _task: &ScheduledTask) {}
}

/// Virtual-clock scheduler for headless playback and tests.
///
/// Time only moves when the owner moves it (see
/// `PresentationController::advance_to`). Keeps counters so callers can check
/// that no two tasks were ever alive at once.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Timestamp,
    live: Option<TaskId>,
    scheduled: usize,
    cancelled: usize,
    overlaps: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the virtual clock at `now` instead of zero.
    pub fn starting_at(now: Timestamp) -> Self {
        ManualScheduler {
            now,
            ..Self::default()
        }
    }

    /// Move the clock forward. Never moves backwards.
    pub fn set_now(&mut self, now: Timestamp) {
        self.now = self.now.max(now);
    }

    /// The task the scheduler currently considers alive.
    pub fn live(&self) -> Option<TaskId> {
        self.live
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled
    }

    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }

    /// How many times a task was scheduled while another was still alive.
    pub fn overlap_count(&self) -> usize {
        self.overlaps
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn schedule(&mut self, task: &ScheduledTask) {
        if self.live.is_some() {
            self.overlaps += 1;
        }
        self.live = Some(task.id());
        self.scheduled += 1;
    }

    fn cancel(&mut self, task: &ScheduledTask) {
        if self.live == Some(task.id()) {
            self.live = None;
        }
        self.cancelled += 1;
    }

    fn completed(&mut self, task: &ScheduledTask) {
        if self.live == Some(task.id()) {
            self.live = None;
        }
    }
}

// Presentation state machine: active scene index, play/pause flag, and the single
// pending task. At most one task is alive; every transition cancels before it schedules.
// The last scene is held for the loop-restart pause, then playback starts over.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::PresentationError;
use crate::input::ControlAction;
use crate::recording::RecordingSession;
use crate::schedule::{ManualScheduler, ScheduledTask, Scheduler, TaskId, TaskKind};
use crate::types::{PresentationConfig, Scene, SceneList, Timestamp};

/// Display collaborator driven by the controller.
///
/// Implementations are best-effort: a missing element only skips the visual
/// work, it never stops the state machine.
pub trait SceneView {
    /// Make `scene` the visible one: hide the others, replay its entry
    /// animations, and draw `progress` (0.0..1.0).
    fn show_scene(&mut self, index: usize, scene: &Scene, progress: f64);

    /// Reflect the play/pause state on the play/pause control.
    fn set_playing(&mut self, playing: bool);

    /// Show or hide the interactive controls.
    fn set_controls_enabled(&mut self, enabled: bool);
}

/// Serializable view of the controller state, returned to JS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub current_index: usize,
    pub scene_id: String,
    pub is_playing: bool,
    pub progress: f64,
    pub pending: Option<ScheduledTask>,
    pub controls_enabled: bool,
    pub recording: Option<RecordingSession>,
}

/// Timed scene presentation controller.
pub struct PresentationController<S, V> {
    scenes: SceneList,
    loop_pause_ms: u64,
    recording_tail_ms: u64,
    current_index: usize,
    is_playing: bool,
    pending: Option<ScheduledTask>,
    next_task_id: u64,
    recording: Option<RecordingSession>,
    scheduler: S,
    view: V,
}

impl<S: Scheduler, V: SceneView> PresentationController<S, V> {
    /// Build the controller and start playing from the first scene.
    pub fn new(
        config: &PresentationConfig,
        scheduler: S,
        view: V,
    ) -> Result<Self, PresentationError> {
        let scenes = config.scene_list()?;

        let mut controller = PresentationController {
            scenes,
            loop_pause_ms: config.loop_pause_ms,
            recording_tail_ms: config.recording_tail_ms,
            current_index: 0,
            is_playing: true,
            pending: None,
            next_task_id: 0,
            recording: None,
            scheduler,
            view,
        };

        controller.view.set_playing(true);
        controller.start();
        Ok(controller)
    }

    pub fn scenes(&self) -> &SceneList {
        &self.scenes
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_scene(&self) -> &Scene {
        &self.scenes[self.current_index]
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn pending_task(&self) -> Option<&ScheduledTask> {
        self.pending.as_ref()
    }

    pub fn loop_pause_ms(&self) -> u64 {
        self.loop_pause_ms
    }

    /// False while a recording session runs.
    pub fn controls_enabled(&self) -> bool {
        self.recording.is_none()
    }

    pub fn recording(&self) -> Option<&RecordingSession> {
        self.recording.as_ref()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Share of the total duration covered by the scenes before the current one.
    pub fn progress_fraction(&self) -> f64 {
        self.progress_at(self.current_index)
    }

    fn progress_at(&self, index: usize) -> f64 {
        self.scenes.elapsed_before(index) as f64 / self.scenes.total_duration_ms() as f64
    }

    /// Display a scene without touching the playback state.
    pub fn show_scene(&mut self, index: usize) {
        let Some(scene) = self.scenes.get(index) else {
            debug!(index, "no scene at index, nothing to show");
            return;
        };
        let progress = self.progress_at(index);
        debug!(index, scene = %scene.id(), progress, "showing scene");
        self.view.show_scene(index, scene, progress);
    }

    /// Flip between playing and paused.
    ///
    /// Resuming restarts the current scene's full duration; time elapsed before
    /// the pause is not kept. Resuming on the last scene restarts the presentation.
    pub fn toggle_play_pause(&mut self) {
        self.is_playing = !self.is_playing;

        if self.is_playing {
            if self.current_index < self.scenes.last_index() {
                self.start();
            } else {
                self.restart();
            }
        } else {
            self.cancel_pending();
        }

        debug!(playing = self.is_playing, index = self.current_index, "play state toggled");
        self.view.set_playing(self.is_playing);
    }

    /// Resume if paused.
    pub fn play(&mut self) {
        if !self.is_playing {
            self.toggle_play_pause();
        }
    }

    /// Pause if playing.
    pub fn pause(&mut self) {
        if self.is_playing {
            self.toggle_play_pause();
        }
    }

    /// Step forward one scene. Returns false (and changes nothing) on the last scene.
    pub fn next(&mut self) -> bool {
        if self.current_index >= self.scenes.last_index() {
            return false;
        }
        self.cancel_pending();
        self.current_index += 1;
        self.resume_or_show();
        true
    }

    /// Step back one scene. Returns false (and changes nothing) on the first scene.
    pub fn previous(&mut self) -> bool {
        if self.current_index == 0 {
            return false;
        }
        self.cancel_pending();
        self.current_index -= 1;
        self.resume_or_show();
        true
    }

    /// Back to the first scene, playing, with a fresh task chain.
    pub fn restart(&mut self) {
        self.cancel_pending();
        self.current_index = 0;
        self.is_playing = true;
        info!("presentation restarted");
        self.view.set_playing(true);
        self.start();
    }

    /// Deliver an expired task. Returns false when `id` is not the pending
    /// task (it was cancelled or already fired), in which case nothing happens.
    pub fn fire(&mut self, id: TaskId) -> bool {
        let task = match self.pending.take() {
            Some(task) if task.id() == id => task,
            other => {
                self.pending = other;
                trace!(task = id.as_u64(), "ignoring stale task");
                return false;
            }
        };
        self.scheduler.completed(&task);

        match task.kind() {
            TaskKind::Advance => {
                if self.current_index < self.scenes.last_index() {
                    self.current_index += 1;
                }
                self.start();
            }
            TaskKind::LoopRestart => self.restart(),
        }
        true
    }

    /// Apply a user input. Ignored while a recording session has the controls disabled.
    pub fn handle(&mut self, action: ControlAction) -> bool {
        if self.recording.is_some() {
            debug!(?action, "controls disabled during recording");
            return false;
        }

        match action {
            ControlAction::TogglePlayPause => self.toggle_play_pause(),
            ControlAction::Restart => self.restart(),
            ControlAction::Next => return self.next(),
            ControlAction::Previous => return self.previous(),
        }
        true
    }

    /// Start a recording session: restart from the first scene and disable the
    /// controls until `finish_recording`.
    pub fn begin_recording(&mut self) -> Result<RecordingSession, PresentationError> {
        if self.recording.is_some() {
            return Err(PresentationError::RecordingInProgress);
        }

        self.restart();
        let session = RecordingSession::new(
            self.scheduler.now(),
            self.scenes.total_duration_ms(),
            self.recording_tail_ms,
        );
        self.recording = Some(session);
        self.view.set_controls_enabled(false);
        info!(window_ms = session.window_ms(), "recording started");
        Ok(session)
    }

    /// End the running recording session. Returns false if none was running.
    pub fn finish_recording(&mut self) -> bool {
        if self.recording.take().is_none() {
            return false;
        }
        self.view.set_controls_enabled(true);
        info!("recording finished");
        true
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_index: self.current_index,
            scene_id: self.current_scene().id().to_string(),
            is_playing: self.is_playing,
            progress: self.progress_fraction(),
            pending: self.pending,
            controls_enabled: self.controls_enabled(),
            recording: self.recording,
        }
    }

    fn resume_or_show(&mut self) {
        if self.is_playing {
            self.start();
        } else {
            self.show_scene(self.current_index);
        }
    }

    /// Show the current scene and schedule what comes after it.
    fn start(&mut self) {
        if !self.is_playing {
            return;
        }

        self.show_scene(self.current_index);

        if self.current_index < self.scenes.last_index() {
            let duration_ms = self.scenes[self.current_index].duration_ms();
            self.schedule(TaskKind::Advance, duration_ms);
        } else {
            self.schedule(TaskKind::LoopRestart, self.loop_pause_ms);
        }
    }

    fn schedule(&mut self, kind: TaskKind, delay_ms: u64) {
        self.cancel_pending();

        let task = ScheduledTask::new(
            TaskId::new(self.next_task_id),
            kind,
            self.scheduler.now(),
            delay_ms,
        );
        self.next_task_id += 1;

        trace!(task = task.id().as_u64(), ?kind, delay_ms, "scheduling task");
        self.scheduler.schedule(&task);
        self.pending = Some(task);
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            trace!(task = task.id().as_u64(), "cancelling task");
            self.scheduler.cancel(&task);
        }
    }
}

impl<V: SceneView> PresentationController<ManualScheduler, V> {
    /// Current virtual time.
    pub fn now(&self) -> Timestamp {
        self.scheduler.now()
    }

    /// Move the virtual clock to `target`, firing every task and finishing
    /// any recording that comes due on the way, in time order.
    pub fn advance_to(&mut self, target: Timestamp) {
        loop {
            let task_due = self
                .pending
                .filter(|task| task.due_at() <= target)
                .map(|task| (task.id(), task.due_at()));
            let recording_due = self
                .recording
                .map(|session| session.completes_at())
                .filter(|due| *due <= target);

            match (task_due, recording_due) {
                (None, None) => break,
                (Some((_, task_at)), Some(recording_at)) if recording_at < task_at => {
                    self.scheduler.set_now(recording_at);
                    self.finish_recording();
                }
                (Some((id, task_at)), _) => {
                    self.scheduler.set_now(task_at);
                    self.fire(id);
                }
                (None, Some(recording_at)) => {
                    self.scheduler.set_now(recording_at);
                    self.finish_recording();
                }
            }
        }
        self.scheduler.set_now(target);
    }

    /// Move the virtual clock forward by `ms`.
    pub fn advance_by(&mut self, ms: u64) {
        let target = self.scheduler.now().after(ms);
        self.advance_to(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{controller_with, ViewCall};
    use proptest::prelude::*;

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn starts_playing_first_scene() {
        let (controller, view) = controller_with(&[4000, 4000, 4000]);
        assert_eq!(controller.current_index(), 0);
        assert!(controller.is_playing());

        let task = controller.pending_task().unwrap();
        assert_eq!(task.kind(), TaskKind::Advance);
        assert_eq!(task.delay_ms(), 4000);
        assert_eq!(view.shown(), vec![0]);
        assert_eq!(view.calls()[0], ViewCall::Playing(true));
    }

    #[test]
    fn seven_scene_loop_timeline() {
        let (mut controller, _view) = controller_with(&[4000; 7]);

        for (t, expected) in [
            (0, 0),
            (3_999, 0),
            (4_000, 1),
            (8_000, 2),
            (20_000, 5),
            (24_000, 6),
            (25_999, 6),
            (26_000, 0),
            (30_000, 1),
        ] {
            controller.advance_to(at(t));
            assert_eq!(controller.current_index(), expected, "at t={t}");
        }
        assert!(controller.is_playing());
    }

    #[test]
    fn last_scene_schedules_loop_restart() {
        let (mut controller, _view) = controller_with(&[1000, 1000]);
        controller.advance_to(at(1000));
        let task = controller.pending_task().unwrap();
        assert_eq!(task.kind(), TaskKind::LoopRestart);
        assert_eq!(task.delay_ms(), 2000);
        assert_eq!(task.due_at(), at(3000));
    }

    #[test]
    fn progress_matches_prefix_sums() {
        let (mut controller, _view) = controller_with(&[1000, 3000, 4000]);
        assert_eq!(controller.progress_fraction(), 0.0);
        controller.next();
        assert!((controller.progress_fraction() - 0.125).abs() < 1e-9);
        controller.next();
        assert!((controller.progress_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn show_scene_passes_progress_to_view() {
        let (mut controller, view) = controller_with(&[1000, 1000]);
        view.clear();
        controller.show_scene(1);
        assert_eq!(
            view.calls(),
            vec![ViewCall::Show {
                index: 1,
                id: "scene1".into(),
                progress: 0.5
            }]
        );
        // Display only.
        assert_eq!(controller.current_index(), 0);

        controller.show_scene(9);
        assert_eq!(view.calls().len(), 1);
    }

    #[test]
    fn next_is_noop_on_last_scene() {
        let (mut controller, _view) = controller_with(&[1000, 1000]);
        assert!(controller.next());
        let pending = *controller.pending_task().unwrap();

        assert!(!controller.next());
        assert_eq!(controller.current_index(), 1);
        assert_eq!(controller.pending_task(), Some(&pending));
    }

    #[test]
    fn previous_is_noop_on_first_scene() {
        let (mut controller, view) = controller_with(&[1000, 1000]);
        let pending = *controller.pending_task().unwrap();
        view.clear();

        assert!(!controller.previous());
        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.pending_task(), Some(&pending));
        assert!(view.calls().is_empty());
    }

    #[test]
    fn next_while_playing_restarts_timer_chain() {
        let (mut controller, _view) = controller_with(&[4000, 4000, 4000]);
        controller.advance_to(at(3000));
        assert!(controller.next());

        let task = controller.pending_task().unwrap();
        assert_eq!(task.scheduled_at(), at(3000));
        assert_eq!(task.due_at(), at(7000));

        controller.advance_to(at(6999));
        assert_eq!(controller.current_index(), 1);
        controller.advance_to(at(7000));
        assert_eq!(controller.current_index(), 2);
    }

    #[test]
    fn next_and_previous_while_paused_only_display() {
        let (mut controller, view) = controller_with(&[1000, 1000, 1000]);
        controller.pause();
        view.clear();

        assert!(controller.next());
        assert!(controller.pending_task().is_none());
        assert_eq!(view.shown(), vec![1]);

        assert!(controller.previous());
        assert!(controller.pending_task().is_none());
        assert_eq!(controller.current_index(), 0);

        controller.advance_by(10_000);
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn pause_then_resume_restarts_full_duration() {
        let (mut controller, _view) = controller_with(&[4000, 4000, 4000]);
        controller.advance_to(at(5000));
        assert_eq!(controller.current_index(), 1);

        controller.toggle_play_pause();
        assert!(!controller.is_playing());
        assert!(controller.pending_task().is_none());

        controller.toggle_play_pause();
        assert!(controller.is_playing());
        assert_eq!(controller.current_index(), 1);
        let task = controller.pending_task().unwrap();
        assert_eq!(task.delay_ms(), 4000);
        assert_eq!(task.due_at(), at(9000));
    }

    #[test]
    fn resume_on_last_scene_restarts() {
        let (mut controller, _view) = controller_with(&[1000, 1000]);
        controller.next();
        controller.pause();
        controller.play();
        assert_eq!(controller.current_index(), 0);
        assert!(controller.is_playing());
        assert_eq!(controller.pending_task().unwrap().kind(), TaskKind::Advance);
    }

    #[test]
    fn play_and_pause_are_idempotent() {
        let (mut controller, view) = controller_with(&[1000, 1000]);
        view.clear();
        controller.play();
        assert!(view.calls().is_empty());

        controller.pause();
        controller.pause();
        assert_eq!(view.calls(), vec![ViewCall::Playing(false)]);
    }

    #[test]
    fn restart_resets_everything() {
        let (mut controller, view) = controller_with(&[1000, 1000, 1000]);
        controller.advance_to(at(1500));
        controller.pause();
        view.clear();

        controller.restart();
        assert_eq!(controller.current_index(), 0);
        assert!(controller.is_playing());
        let task = controller.pending_task().unwrap();
        assert_eq!(task.kind(), TaskKind::Advance);
        assert_eq!(task.scheduled_at(), at(1500));
        assert_eq!(view.shown(), vec![0]);
        assert!(view.calls().contains(&ViewCall::Playing(true)));
    }

    #[test]
    fn stale_task_ids_are_ignored() {
        let (mut controller, _view) = controller_with(&[1000, 1000, 1000]);
        let stale = controller.pending_task().unwrap().id();
        controller.next();

        assert!(!controller.fire(stale));
        assert_eq!(controller.current_index(), 1);
        assert!(controller.pending_task().is_some());

        let live = controller.pending_task().unwrap().id();
        assert!(controller.fire(live));
        assert_eq!(controller.current_index(), 2);
        assert!(!controller.fire(live));
    }

    #[test]
    fn single_scene_keeps_looping() {
        let (mut controller, view) = controller_with(&[5000]);
        assert_eq!(controller.pending_task().unwrap().kind(), TaskKind::LoopRestart);
        controller.advance_to(at(6000));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(view.shown(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn handle_maps_actions() {
        let (mut controller, _view) = controller_with(&[1000, 1000]);
        assert!(controller.handle(ControlAction::Next));
        assert!(!controller.handle(ControlAction::Next));
        assert!(controller.handle(ControlAction::Previous));
        assert!(controller.handle(ControlAction::TogglePlayPause));
        assert!(!controller.is_playing());
        assert!(controller.handle(ControlAction::Restart));
        assert!(controller.is_playing());
    }

    #[test]
    fn recording_disables_controls_until_done() {
        let (mut controller, view) = controller_with(&[4000; 7]);
        controller.advance_to(at(9000));
        controller.pause();
        view.clear();

        let session = controller.begin_recording().unwrap();
        assert_eq!(session.window_ms(), 29_000);
        assert_eq!(session.completes_at(), at(38_000));
        assert_eq!(controller.current_index(), 0);
        assert!(controller.is_playing());
        assert!(!controller.controls_enabled());
        assert!(view.calls().contains(&ViewCall::Controls(false)));

        assert!(!controller.handle(ControlAction::Next));
        assert_eq!(controller.current_index(), 0);
        assert_eq!(
            controller.begin_recording(),
            Err(PresentationError::RecordingInProgress)
        );

        controller.advance_to(at(37_999));
        assert!(!controller.controls_enabled());
        controller.advance_to(at(38_000));
        assert!(controller.controls_enabled());
        assert_eq!(view.calls().last(), Some(&ViewCall::Controls(true)));
        assert!(!controller.finish_recording());
    }

    #[test]
    fn snapshot_reflects_state() {
        let (mut controller, _view) = controller_with(&[1000, 3000]);
        controller.next();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_index, 1);
        assert_eq!(snapshot.scene_id, "scene1");
        assert!(snapshot.is_playing);
        assert!((snapshot.progress - 0.25).abs() < 1e-9);
        assert_eq!(snapshot.pending.unwrap().kind(), TaskKind::LoopRestart);
        assert!(snapshot.controls_enabled);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"scene_id\":\"scene1\""));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = PresentationConfig {
            scenes: vec![],
            ..Default::default()
        };
        let result = PresentationController::new(
            &config,
            ManualScheduler::new(),
            crate::testing::ViewLog::default(),
        );
        assert!(matches!(result, Err(PresentationError::EmptySceneList)));
    }

    mod property_tests {
        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Toggle,
            Play,
            Pause,
            Next,
            Previous,
            Restart,
            Wait(u64),
            Record,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Toggle),
                Just(Op::Play),
                Just(Op::Pause),
                Just(Op::Next),
                Just(Op::Previous),
                Just(Op::Restart),
                (0u64..10_000).prop_map(Op::Wait),
                Just(Op::Record),
            ]
        }

        fn durations_strategy() -> impl Strategy<Value = Vec<u64>> {
            prop::collection::vec(1u64..5_000, 1..8)
        }

        proptest! {
            /// Progress at index i is the share of durations before i.
            #[test]
            fn progress_is_prefix_share(durations in durations_strategy(), steps in 0usize..10) {
                let (mut controller, _view) = controller_with(&durations);
                controller.pause();
                for _ in 0..steps {
                    controller.next();
                }

                let i = controller.current_index();
                let before: u64 = durations[..i].iter().sum();
                let total: u64 = durations.iter().sum();
                let expected = before as f64 / total as f64;
                prop_assert!((controller.progress_fraction() - expected).abs() < 1e-12);
                prop_assert!(controller.progress_fraction() < 1.0);
            }

            /// No sequence of operations ever leaves two tasks alive.
            #[test]
            fn at_most_one_pending_task(
                durations in durations_strategy(),
                ops in prop::collection::vec(op_strategy(), 0..40)
            ) {
                let (mut controller, _view) = controller_with(&durations);
                for op in ops {
                    match op {
                        Op::Toggle => controller.toggle_play_pause(),
                        Op::Play => controller.play(),
                        Op::Pause => controller.pause(),
                        Op::Next => { controller.next(); }
                        Op::Previous => { controller.previous(); }
                        Op::Restart => controller.restart(),
                        Op::Wait(ms) => controller.advance_by(ms),
                        Op::Record => { let _ = controller.begin_recording(); }
                    }

                    let scheduler = controller.scheduler();
                    prop_assert_eq!(scheduler.overlap_count(), 0);
                    prop_assert_eq!(scheduler.live(), controller.pending_task().map(|t| t.id()));
                    prop_assert!(controller.current_index() < durations.len());
                    prop_assert_eq!(controller.is_playing(), controller.pending_task().is_some());
                }
            }

            /// Uninterrupted playback agrees with the pure timeline query.
            #[test]
            fn driven_playback_matches_scene_at(
                durations in durations_strategy(),
                elapsed in 0u64..100_000
            ) {
                let (mut controller, _view) = controller_with(&durations);
                controller.advance_to(Timestamp::from_millis(elapsed));
                let expected = controller.scenes().scene_at(elapsed, controller.loop_pause_ms());
                prop_assert_eq!(controller.current_index(), expected);
            }
        }
    }
}

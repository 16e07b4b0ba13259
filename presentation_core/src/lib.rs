// presentation_core: Rust/WASM controller for timed scene presentations.
// The state machine lives in `controller`; `web` is the browser plumbing around it.

mod controller;
mod error;
mod input;
mod recording;
mod schedule;
#[cfg(test)]
mod testing;
mod types;
mod web;

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc;
use gloo::events::EventListener;
use gloo::timers::future::TimeoutFuture;
use tracing::info;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

pub use controller::{PlaybackSnapshot, PresentationController, SceneView};
pub use error::PresentationError;
pub use input::ControlAction;
pub use recording::RecordingSession;
pub use schedule::{ManualScheduler, ScheduledTask, Scheduler, TaskId, TaskKind};
pub use types::*;
pub use web::{BrowserScheduler, DomSceneView};

use web::{bind_input, run_event_loop, timer_delay, BrowserController};

/// Initialize the panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
}

/// Presentation handle exposed to JavaScript.
///
/// Construct one per page and keep it; dropping it (`free()` from JS) detaches
/// the listeners and stops the scene timer.
///
/// # Example JSON Config
/// ```json
/// {
///   "scenes": [
///     { "id": "intro", "duration_ms": 4000 },
///     { "id": "closing", "duration_ms": 4000 }
///   ],
///   "loop_pause_ms": 2000,
///   "recording_tail_ms": 1000
/// }
/// ```
#[wasm_bindgen]
pub struct Presentation {
    controller: Rc<RefCell<BrowserController>>,
    _listeners: Vec<EventListener>,
}

#[wasm_bindgen]
impl Presentation {
    /// Bind to the current document and start playing. An empty config string
    /// uses the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Presentation, JsValue> {
        let config = PresentationConfig::from_json(config_json)?;
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| JsValue::from_str("No document available"))?;

        let (events, receiver) = mpsc::unbounded();
        let view = DomSceneView::new(document.clone(), config.dom.clone());
        let controller =
            PresentationController::new(&config, BrowserScheduler::new(events.clone()), view)?;
        let controller = Rc::new(RefCell::new(controller));

        let listeners = bind_input(&document, &config.dom, &events);
        spawn_local(run_event_loop(Rc::downgrade(&controller), receiver));

        info!(scenes = config.scenes.len(), "presentation initialized");
        Ok(Presentation {
            controller,
            _listeners: listeners,
        })
    }

    pub fn play(&self) {
        self.controller.borrow_mut().play();
    }

    pub fn pause(&self) {
        self.controller.borrow_mut().pause();
    }

    pub fn toggle_play_pause(&self) {
        self.controller.borrow_mut().toggle_play_pause();
    }

    pub fn restart(&self) {
        self.controller.borrow_mut().restart();
    }

    /// Returns false when already on the last scene.
    pub fn next(&self) -> bool {
        self.controller.borrow_mut().next()
    }

    /// Returns false when already on the first scene.
    pub fn previous(&self) -> bool {
        self.controller.borrow_mut().previous()
    }

    /// Apply a `KeyboardEvent.code` as if it had been pressed.
    pub fn handle_key(&self, code: &str) -> bool {
        ControlAction::from_key_code(code)
            .is_some_and(|action| self.controller.borrow_mut().handle(action))
    }

    /// Restart with controls hidden; the promise resolves once every scene
    /// has played plus the recording tail, with controls restored.
    pub fn play_for_recording(&self) -> js_sys::Promise {
        let started = self.controller.borrow_mut().begin_recording();
        let session = match started {
            Ok(session) => session,
            Err(err) => return js_sys::Promise::reject(&JsValue::from(err)),
        };

        let controller = Rc::downgrade(&self.controller);
        future_to_promise(async move {
            TimeoutFuture::new(timer_delay(session.window_ms())).await;
            // A presentation freed mid-recording has nothing left to restore.
            if let Some(controller) = controller.upgrade() {
                controller.borrow_mut().finish_recording();
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn current_index(&self) -> usize {
        self.controller.borrow().current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.controller.borrow().is_playing()
    }

    /// Progress bar fraction, 0.0 up to (but never reaching) 1.0.
    pub fn progress(&self) -> f64 {
        self.controller.borrow().progress_fraction()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.controller.borrow().scenes().total_duration_ms()
    }

    /// Scene an uninterrupted playback shows `elapsed_ms` after a restart.
    pub fn scene_at(&self, elapsed_ms: u64) -> usize {
        let controller = self.controller.borrow();
        controller
            .scenes()
            .scene_at(elapsed_ms, controller.loop_pause_ms())
    }

    /// Current state as JSON.
    pub fn snapshot(&self) -> Result<String, JsValue> {
        let snapshot = self.controller.borrow().snapshot();
        serde_json::to_string(&snapshot)
            .map_err(|e| JsValue::from(PresentationError::from(e)))
    }
}

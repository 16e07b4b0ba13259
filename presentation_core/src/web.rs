// Browser host: DOM scene view, setTimeout-backed scheduler, and input wiring.
// Timer expiries and input events travel over one channel to a single local task,
// so no browser callback ever holds the controller.

use std::cell::RefCell;
use std::rc::Weak;

use futures::channel::mpsc;
use futures::StreamExt;
use gloo::events::{EventListener, EventListenerOptions};
use gloo::timers::callback::Timeout;
use tracing::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, KeyboardEvent};

use crate::controller::{PresentationController, SceneView};
use crate::input::ControlAction;
use crate::schedule::{ScheduledTask, Scheduler, TaskId};
use crate::types::{DomSettings, Scene, Timestamp};

pub(crate) type BrowserController = PresentationController<BrowserScheduler, DomSceneView>;

/// Longest delay `setTimeout` honours; gloo passes the delay on as an `i32`.
pub(crate) const MAX_TIMER_DELAY_MS: u32 = i32::MAX as u32;

/// Convert a delay to what the browser timer accepts, saturating at `MAX_TIMER_DELAY_MS`.
pub(crate) fn timer_delay(ms: u64) -> u32 {
    u32::try_from(ms).map_or(MAX_TIMER_DELAY_MS, |ms| ms.min(MAX_TIMER_DELAY_MS))
}

/// Something that happened in the page and must be applied to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostEvent {
    TaskFired(TaskId),
    Action(ControlAction),
}

/// Scheduler backed by `setTimeout`. Holds at most one browser timer.
pub struct BrowserScheduler {
    timeout: Option<Timeout>,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl BrowserScheduler {
    pub(crate) fn new(events: mpsc::UnboundedSender<HostEvent>) -> Self {
        BrowserScheduler {
            timeout: None,
            events,
        }
    }
}

impl Scheduler for BrowserScheduler {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(js_sys::Date::now() as u64)
    }

    fn schedule(&mut self, task: &ScheduledTask) {
        let events = self.events.clone();
        let id = task.id();
        let delay = timer_delay(task.delay_ms());

        self.timeout = Some(Timeout::new(delay, move || {
            // Fails only once the presentation has been dropped.
            let _ = events.unbounded_send(HostEvent::TaskFired(id));
        }));
    }

    fn cancel(&mut self, _task: &ScheduledTask) {
        // Dropping a gloo Timeout clears the browser timer.
        self.timeout = None;
    }

    fn completed(&mut self, _task: &ScheduledTask) {
        self.timeout = None;
    }
}

/// Scene view that toggles classes and inline styles in the host document.
pub struct DomSceneView {
    document: Document,
    settings: DomSettings,
}

impl DomSceneView {
    pub fn new(document: Document, settings: DomSettings) -> Self {
        DomSceneView { document, settings }
    }

    fn query(&self, selector: &str) -> Option<HtmlElement> {
        self.document
            .query_selector(selector)
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    }

    fn hide_all_scenes(&self) {
        let scenes = self
            .document
            .get_elements_by_class_name(&self.settings.scene_class);
        for i in 0..scenes.length() {
            if let Some(scene) = scenes.item(i) {
                let _ = scene.class_list().remove_1(&self.settings.active_class);
            }
        }
    }

    /// Clear inline animations, force a reflow, then let the stylesheet animations run again.
    fn replay_animations(&self, scene: &Element) {
        let Ok(animated) = scene.query_selector_all(&self.settings.animated_selector) else {
            debug!(selector = %self.settings.animated_selector, "invalid animation selector");
            return;
        };

        for i in 0..animated.length() {
            let Some(el) = animated
                .item(i)
                .and_then(|node| node.dyn_into::<HtmlElement>().ok())
            else {
                continue;
            };
            let style = el.style();
            let _ = style.set_property("animation", "none");
            let _ = el.offset_height();
            let _ = style.remove_property("animation");
        }
    }

    fn draw_progress(&self, progress: f64) {
        let Some(fill) = self.query(&self.settings.progress_fill_selector) else {
            return;
        };
        let width = format!("{:.2}%", (progress * 100.0).clamp(0.0, 100.0));
        let _ = fill.style().set_property("width", &width);
    }
}

impl SceneView for DomSceneView {
    fn show_scene(&mut self, index: usize, scene: &Scene, progress: f64) {
        self.hide_all_scenes();

        match self.document.get_element_by_id(scene.id().as_str()) {
            Some(el) => {
                if let Err(err) = el.class_list().add_1(&self.settings.active_class) {
                    debug!(?err, scene = %scene.id(), "could not activate scene");
                }
                self.replay_animations(&el);
            }
            None => debug!(index, scene = %scene.id(), "scene element missing, skipping display"),
        }

        self.draw_progress(progress);
    }

    fn set_playing(&mut self, playing: bool) {
        let Some(button) = self.document.get_element_by_id(&self.settings.play_pause_id) else {
            return;
        };
        button.set_text_content(Some(if playing { "⏸️" } else { "▶️" }));
        let _ = button.set_attribute("title", if playing { "Pause" } else { "Play" });
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        let Some(controls) = self.query(&self.settings.controls_selector) else {
            return;
        };
        let _ = controls
            .style()
            .set_property("display", if enabled { "flex" } else { "none" });
    }
}

/// Attach keyboard, click, and button listeners. Dropping the listeners detaches them.
pub(crate) fn bind_input(
    document: &Document,
    settings: &DomSettings,
    events: &mpsc::UnboundedSender<HostEvent>,
) -> Vec<EventListener> {
    let mut listeners = Vec::new();

    let keys = events.clone();
    listeners.push(EventListener::new_with_options(
        document,
        "keydown",
        EventListenerOptions::enable_prevent_default(),
        move |event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            let Some(action) = ControlAction::from_key_code(&event.code()) else {
                return;
            };
            if action.suppresses_key_default() {
                event.prevent_default();
            }
            let _ = keys.unbounded_send(HostEvent::Action(action));
        },
    ));

    let clicks = events.clone();
    let controls_selector = settings.controls_selector.clone();
    listeners.push(EventListener::new(document, "click", move |event| {
        let inside_controls = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
            .and_then(|el| el.closest(&controls_selector).ok().flatten())
            .is_some();
        if let Some(action) = ControlAction::from_click(inside_controls) {
            let _ = clicks.unbounded_send(HostEvent::Action(action));
        }
    }));

    for (id, action) in [
        (&settings.play_pause_id, ControlAction::TogglePlayPause),
        (&settings.restart_id, ControlAction::Restart),
    ] {
        let Some(button) = document.get_element_by_id(id) else {
            debug!(id = %id, "control button missing");
            continue;
        };
        let presses = events.clone();
        listeners.push(EventListener::new(&button, "click", move |_| {
            let _ = presses.unbounded_send(HostEvent::Action(action));
        }));
    }

    listeners
}

/// Apply host events in arrival order until the presentation goes away.
pub(crate) async fn run_event_loop(
    controller: Weak<RefCell<BrowserController>>,
    mut events: mpsc::UnboundedReceiver<HostEvent>,
) {
    while let Some(event) = events.next().await {
        let Some(cell) = controller.upgrade() else {
            break;
        };
        let mut controller = cell.borrow_mut();
        match event {
            HostEvent::TaskFired(id) => {
                controller.fire(id);
            }
            HostEvent::Action(action) => {
                controller.handle(action);
            }
        }
    }
    debug!("presentation event loop stopped");
}

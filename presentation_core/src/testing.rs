// Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::controller::{PresentationController, SceneView};
use crate::schedule::ManualScheduler;
use crate::types::{PresentationConfig, Scene, SceneConfig};

/// One call received by the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Show { index: usize, id: String, progress: f64 },
    Playing(bool),
    Controls(bool),
}

/// Scene view that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct ViewLog {
    calls: Rc<RefCell<Vec<ViewCall>>>,
}

impl ViewLog {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.borrow().clone()
    }

    pub fn shown(&self) -> Vec<usize> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Show { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl SceneView for ViewLog {
    fn show_scene(&mut self, index: usize, scene: &Scene, progress: f64) {
        self.calls.borrow_mut().push(ViewCall::Show {
            index,
            id: scene.id().to_string(),
            progress,
        });
    }

    fn set_playing(&mut self, playing: bool) {
        self.calls.borrow_mut().push(ViewCall::Playing(playing));
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.calls.borrow_mut().push(ViewCall::Controls(enabled));
    }
}

pub type TestController = PresentationController<ManualScheduler, ViewLog>;

pub fn config_with(durations: &[u64]) -> PresentationConfig {
    PresentationConfig {
        scenes: durations
            .iter()
            .enumerate()
            .map(|(i, d)| SceneConfig::new(format!("scene{i}"), *d))
            .collect(),
        ..Default::default()
    }
}

/// Controller over a virtual clock starting at zero, plus a handle on its view log.
pub fn controller_with(durations: &[u64]) -> (TestController, ViewLog) {
    let view = ViewLog::default();
    let controller =
        PresentationController::new(&config_with(durations), ManualScheduler::new(), view.clone())
            .expect("valid test config");
    (controller, view)
}

// Strong typing over strings. Newtypes for timestamps and scene ids, validated scene lists,
// and the JSON configuration accepted from JS.

use std::collections::HashSet;
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::PresentationError;

/// Wall-clock or virtual time in milliseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// The timestamp `ms` milliseconds later, saturating at the end of time.
    pub fn after(&self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Identifier of a scene's display region in the host document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        SceneId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sequential unit of the presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    id: SceneId,
    duration_ms: u64,
}

impl Scene {
    pub fn new(id: impl Into<String>, duration_ms: u64) -> Self {
        Scene {
            id: SceneId::new(id),
            duration_ms,
        }
    }

    pub fn id(&self) -> &SceneId {
        &self.id
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Ordered, non-empty, immutable list of scenes.
///
/// Every scene has a non-empty unique id and a positive duration; the list is
/// fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneList {
    scenes: Vec<Scene>,
    total_duration_ms: u64,
}

impl SceneList {
    pub fn new(scenes: Vec<Scene>) -> Result<Self, PresentationError> {
        if scenes.is_empty() {
            return Err(PresentationError::EmptySceneList);
        }

        let mut seen = HashSet::with_capacity(scenes.len());
        for (index, scene) in scenes.iter().enumerate() {
            if scene.id.as_str().is_empty() {
                return Err(PresentationError::EmptySceneId { index });
            }
            if scene.duration_ms == 0 {
                return Err(PresentationError::ZeroDuration {
                    id: scene.id.to_string(),
                });
            }
            if !seen.insert(scene.id.as_str()) {
                return Err(PresentationError::DuplicateSceneId(scene.id.to_string()));
            }
        }

        let total_duration_ms = scenes.iter().map(Scene::duration_ms).sum();
        Ok(SceneList {
            scenes,
            total_duration_ms,
        })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Never true: construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    pub fn last_index(&self) -> usize {
        self.scenes.len() - 1
    }

    /// Sum of every scene's duration.
    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    /// Sum of the durations of all scenes strictly before `index`.
    pub fn elapsed_before(&self, index: usize) -> u64 {
        self.scenes.iter().take(index).map(Scene::duration_ms).sum()
    }

    /// Length of one uninterrupted loop: every scene but the last plays for its
    /// duration, the last one is held for the loop-restart pause.
    pub fn cycle_duration_ms(&self, loop_pause_ms: u64) -> u64 {
        self.elapsed_before(self.last_index()) + loop_pause_ms
    }

    /// Index of the scene shown `elapsed_ms` after a restart when nobody touches
    /// the controls. Scene boundaries are half-open: at exactly the end of a
    /// scene the next one is already showing.
    pub fn scene_at(&self, elapsed_ms: u64, loop_pause_ms: u64) -> usize {
        let cycle = self.cycle_duration_ms(loop_pause_ms);
        if cycle == 0 {
            return 0;
        }

        let mut remaining = elapsed_ms % cycle;
        for (index, scene) in self.scenes[..self.last_index()].iter().enumerate() {
            if remaining < scene.duration_ms {
                return index;
            }
            remaining -= scene.duration_ms;
        }
        self.last_index()
    }
}

impl Index<usize> for SceneList {
    type Output = Scene;

    fn index(&self, index: usize) -> &Scene {
        &self.scenes[index]
    }
}

/// Presentation configuration passed from JS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationConfig {
    #[serde(default = "default_scenes")]
    pub scenes: Vec<SceneConfig>,
    /// Pause after the last scene before looping back to the first (milliseconds).
    #[serde(default = "default_loop_pause")]
    pub loop_pause_ms: u64,
    /// Extra time a recording session waits past the total duration (milliseconds).
    #[serde(default = "default_recording_tail")]
    pub recording_tail_ms: u64,
    #[serde(default)]
    pub dom: DomSettings,
}

impl PresentationConfig {
    /// Parse a JSON config. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, PresentationError> {
        if json.trim().is_empty() {
            return Ok(PresentationConfig::default());
        }
        let config: PresentationConfig = serde_json::from_str(json)
            .map_err(|e| PresentationError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Build the validated scene list and check the timing settings.
    pub fn scene_list(&self) -> Result<SceneList, PresentationError> {
        // A zero pause would let a single-scene loop restart forever without time passing.
        if self.loop_pause_ms == 0 {
            return Err(PresentationError::InvalidConfig(
                "loop_pause_ms must be positive".to_string(),
            ));
        }

        SceneList::new(
            self.scenes
                .iter()
                .map(|s| Scene::new(s.id.clone(), s.duration_ms))
                .collect(),
        )
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        PresentationConfig {
            scenes: default_scenes(),
            loop_pause_ms: default_loop_pause(),
            recording_tail_ms: default_recording_tail(),
            dom: DomSettings::default(),
        }
    }
}

/// JSON-friendly scene configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub id: String,
    pub duration_ms: u64,
}

impl SceneConfig {
    pub fn new(id: impl Into<String>, duration_ms: u64) -> Self {
        SceneConfig {
            id: id.into(),
            duration_ms,
        }
    }
}

fn default_scenes() -> Vec<SceneConfig> {
    ["intro", "member1", "member2", "member3", "member4", "member5", "closing"]
        .into_iter()
        .map(|id| SceneConfig::new(id, 4000))
        .collect()
}

fn default_loop_pause() -> u64 {
    2000
}

fn default_recording_tail() -> u64 {
    1000
}

/// Where the browser host finds things in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSettings {
    /// Class shared by every scene section.
    #[serde(default = "default_scene_class")]
    pub scene_class: String,
    /// Class marking the visible scene.
    #[serde(default = "default_active_class")]
    pub active_class: String,
    /// Region whose clicks never advance the presentation.
    #[serde(default = "default_controls_selector")]
    pub controls_selector: String,
    #[serde(default = "default_play_pause_id")]
    pub play_pause_id: String,
    #[serde(default = "default_restart_id")]
    pub restart_id: String,
    #[serde(default = "default_progress_fill_selector")]
    pub progress_fill_selector: String,
    /// Elements inside a scene whose CSS animations replay on entry.
    #[serde(default = "default_animated_selector")]
    pub animated_selector: String,
}

impl Default for DomSettings {
    fn default() -> Self {
        DomSettings {
            scene_class: default_scene_class(),
            active_class: default_active_class(),
            controls_selector: default_controls_selector(),
            play_pause_id: default_play_pause_id(),
            restart_id: default_restart_id(),
            progress_fill_selector: default_progress_fill_selector(),
            animated_selector: default_animated_selector(),
        }
    }
}

fn default_scene_class() -> String {
    "scene".to_string()
}

fn default_active_class() -> String {
    "active".to_string()
}

fn default_controls_selector() -> String {
    ".controls".to_string()
}

fn default_play_pause_id() -> String {
    "playPause".to_string()
}

fn default_restart_id() -> String {
    "restart".to_string()
}

fn default_progress_fill_selector() -> String {
    ".progress-fill".to_string()
}

fn default_animated_selector() -> String {
    r#"[class*="animation"], .typing-effect"#.to_string()
}

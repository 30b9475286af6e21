use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::Horizontal
    }
}

/// Readiness of one synthesized audio clip (source- or target-language side
/// of a text object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioState {
    pub ready: bool,
    pub path: Option<String>,
}

/// One recognized text region and its translation, positioned in screen
/// space.
///
/// Created when OCR/translation completes, cleared wholesale on stop,
/// language change, capture-mode change, or snapshot cancel. Positions are
/// mutated in place when the capture region drifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextObject {
    pub id: String,
    pub source_text: String,
    pub translated_text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
    pub source_audio: AudioState,
    pub target_audio: AudioState,
}

impl TextObject {
    pub fn new(
        source_text: String,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        orientation: Orientation,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_text,
            translated_text: String::new(),
            x,
            y,
            width,
            height,
            orientation,
            source_audio: AudioState::default(),
            target_audio: AudioState::default(),
        }
    }
}

/// In-process text-object store: the single owner of all recognized text
/// regions.
///
/// Every mutation bumps a revision on a watch channel; the host subscribes
/// to it and re-renders the overlay. Clears and routine replacements go
/// through the same channel, so a clear can never be visually overtaken by
/// a stale render still in flight.
pub struct TextObjectStore {
    objects: RwLock<Vec<TextObject>>,
    /// Hash of the last committed recognition result, used to skip commits
    /// that would change nothing on screen.
    content_hash: RwLock<Option<u64>>,
    revision: watch::Sender<u64>,
}

impl TextObjectStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            objects: RwLock::new(Vec::new()),
            content_hash: RwLock::new(None),
            revision,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn text_objects(&self) -> Vec<TextObject> {
        self.objects.read().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().unwrap().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<TextObject> {
        self.objects
            .read()
            .unwrap()
            .iter()
            .find(|obj| obj.id == id)
            .cloned()
    }

    /// Replace the whole object set with a fresh recognition result.
    /// Returns false (and changes nothing) when the result hashes the same
    /// as the last committed one.
    pub fn replace_all(&self, objects: Vec<TextObject>) -> bool {
        let hash = content_hash(&objects);
        {
            let mut guard = self.content_hash.write().unwrap();
            if *guard == Some(hash) {
                return false;
            }
            *guard = Some(hash);
        }

        *self.objects.write().unwrap() = objects;
        self.bump();
        true
    }

    pub fn clear_all(&self) {
        self.objects.write().unwrap().clear();
        self.bump();
    }

    /// Forget the last committed hash so the next `replace_all` always
    /// applies, even if OCR recognizes the same text again.
    pub fn reset_hash(&self) {
        *self.content_hash.write().unwrap() = None;
    }

    /// Rigidly translate every object; used when the capture region drifts
    /// so overlays stay glued to the underlying window.
    pub fn apply_offset(&self, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        {
            let mut guard = self.objects.write().unwrap();
            if guard.is_empty() {
                return;
            }
            for obj in guard.iter_mut() {
                obj.x += dx;
                obj.y += dy;
            }
        }
        self.bump();
    }

    /// Attach a translation produced by the external translation
    /// collaborator.
    pub fn set_translation(&self, id: &str, translated: String) -> bool {
        let changed = {
            let mut guard = self.objects.write().unwrap();
            match guard.iter_mut().find(|obj| obj.id == id) {
                Some(obj) => {
                    obj.translated_text = translated;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.bump();
        }
        changed
    }

    /// Mark one side's audio clip ready/not-ready. Does not bump the
    /// revision: audio state reaches the surface through a targeted push,
    /// not a re-render.
    pub fn set_audio_state(&self, id: &str, target: bool, ready: bool, path: Option<String>) -> bool {
        let mut guard = self.objects.write().unwrap();
        match guard.iter_mut().find(|obj| obj.id == id) {
            Some(obj) => {
                let slot = if target {
                    &mut obj.target_audio
                } else {
                    &mut obj.source_audio
                };
                slot.ready = ready;
                slot.path = path;
                true
            }
            None => false,
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for TextObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn content_hash(objects: &[TextObject]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for obj in objects {
        obj.source_text.hash(&mut hasher);
        (obj.x as i64, obj.y as i64, obj.width as i64, obj.height as i64).hash(&mut hasher);
        obj.orientation.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(text: &str, x: f64, y: f64) -> TextObject {
        TextObject::new(text.to_string(), x, y, 120.0, 24.0, Orientation::Horizontal)
    }

    #[test]
    fn replace_all_skips_identical_content() {
        let store = TextObjectStore::new();
        assert!(store.replace_all(vec![object("hello", 10.0, 20.0)]));
        // Same text and geometry, different ids: still considered identical.
        assert!(!store.replace_all(vec![object("hello", 10.0, 20.0)]));
    }

    #[test]
    fn reset_hash_forces_next_commit() {
        let store = TextObjectStore::new();
        assert!(store.replace_all(vec![object("hello", 10.0, 20.0)]));
        store.reset_hash();
        assert!(store.replace_all(vec![object("hello", 10.0, 20.0)]));
    }

    #[test]
    fn apply_offset_translates_every_object() {
        let store = TextObjectStore::new();
        store.replace_all(vec![object("a", 10.0, 20.0), object("b", 50.0, 60.0)]);
        store.apply_offset(5.0, -3.0);

        let objects = store.text_objects();
        assert_eq!((objects[0].x, objects[0].y), (15.0, 17.0));
        assert_eq!((objects[1].x, objects[1].y), (55.0, 57.0));
    }

    #[test]
    fn mutations_bump_the_revision() {
        let store = TextObjectStore::new();
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.replace_all(vec![object("a", 0.0, 0.0)]);
        store.apply_offset(1.0, 1.0);
        store.clear_all();

        assert_eq!(*rx.borrow(), before + 3);
        assert!(store.is_empty());
    }

    #[test]
    fn zero_offset_is_a_no_op() {
        let store = TextObjectStore::new();
        store.replace_all(vec![object("a", 0.0, 0.0)]);
        let rx = store.subscribe();
        let before = *rx.borrow();

        store.apply_offset(0.0, 0.0);
        assert_eq!(*rx.borrow(), before);
    }

    #[test]
    fn set_audio_state_targets_one_side() {
        let store = TextObjectStore::new();
        store.replace_all(vec![object("a", 0.0, 0.0)]);
        let id = store.text_objects()[0].id.clone();

        assert!(store.set_audio_state(&id, true, true, Some("/tmp/clip.wav".into())));

        let obj = store.get(&id).unwrap();
        assert!(obj.target_audio.ready);
        assert_eq!(obj.target_audio.path.as_deref(), Some("/tmp/clip.wav"));
        assert!(!obj.source_audio.ready);
    }

    #[test]
    fn set_audio_state_unknown_id_is_false() {
        let store = TextObjectStore::new();
        assert!(!store.set_audio_state("missing", false, true, None));
    }
}

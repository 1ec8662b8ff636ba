//! Audio file records with selection and playback pointers.
//!
//! Only the selection survives a restart.  The file collection is rebuilt
//! by the application each run because records refer to on-disk media that
//! may have moved; see [`persistable`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observability::{STORE_PERSIST_ERRORS, STORE_PERSIST_WRITES};
use crate::persist::{KeyValueStore, load_slot, save_slot};
use crate::store::{Reducer, Store, Subscription};
use crate::types::{AudioFileRecord, Metadata};

/// Slot name under which the selection is persisted.
pub const PERSIST_SLOT: &str = "audio-file-storage";

/// Format version of [`PersistedAudioSelection`].
pub const PERSIST_VERSION: u8 = 1;

/// Every audio file the application currently holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileState {
    /// Files in insertion order, unique by id.
    pub files: Vec<AudioFileRecord>,

    /// The file the UI has selected.
    pub selected_file_id: Option<String>,

    /// The file being played.  Exactly this file has `is_playing` set.
    pub currently_playing_id: Option<String>,
}

/// The part of [`AudioFileState`] written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAudioSelection {
    /// The selected file id.
    pub selected_file_id: Option<String>,
}

/// Project `state` onto what gets persisted: the selection pointer only.
pub fn persistable(state: &AudioFileState) -> PersistedAudioSelection {
    PersistedAudioSelection {
        selected_file_id: state.selected_file_id.clone(),
    }
}

/// The actions understood by [`AudioFileState`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioAction {
    /// Add a file, or replace the record with the same id in place.
    AddFile(AudioFileRecord),
    /// Remove a file and any pointer to it.
    RemoveFile(String),
    /// Select an existing file.
    SelectFile(String),
    /// Clear the selection.
    ClearSelection,
    /// Play an existing file, or stop playback with `None`.
    SetPlayingFile(Option<String>),
    /// Merge keys into a file's metadata.
    UpdateFileMetadata {
        /// Target file.
        id: String,
        /// Keys to insert or overwrite.
        metadata: Metadata,
    },
    /// Drop every file and both pointers.
    ClearAllFiles,
    /// Restore a persisted selection without checking that the file exists.
    RestoreSelection(Option<String>),
}

impl AudioFileState {
    /// Look up a file by id.
    pub fn file_by_id(&self, id: &str) -> Option<&AudioFileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    /// The selected file, if the pointer resolves.
    pub fn selected_file(&self) -> Option<&AudioFileRecord> {
        self.selected_file_id
            .as_deref()
            .and_then(|id| self.file_by_id(id))
    }

    /// The playing file, if any.
    pub fn currently_playing_file(&self) -> Option<&AudioFileRecord> {
        self.currently_playing_id
            .as_deref()
            .and_then(|id| self.file_by_id(id))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.files.iter().position(|f| f.id == id)
    }

    fn recompute_playing(&mut self) {
        let playing = self.currently_playing_id.as_deref();
        for file in &mut self.files {
            file.is_playing = Some(file.id.as_str()) == playing;
        }
    }
}

impl Reducer for AudioFileState {
    type Action = AudioAction;

    fn apply(&self, action: AudioAction) -> Option<Self> {
        match action {
            AudioAction::AddFile(file) => {
                let mut next = self.clone();
                match next.position(&file.id) {
                    Some(idx) => next.files[idx] = file,
                    None => next.files.push(file),
                }
                next.recompute_playing();
                Some(next)
            }
            AudioAction::RemoveFile(id) => {
                let idx = self.position(&id)?;
                let mut next = self.clone();
                next.files.remove(idx);
                if next.selected_file_id.as_deref() == Some(id.as_str()) {
                    next.selected_file_id = None;
                }
                if next.currently_playing_id.as_deref() == Some(id.as_str()) {
                    next.currently_playing_id = None;
                }
                Some(next)
            }
            AudioAction::SelectFile(id) => {
                self.position(&id)?;
                if self.selected_file_id.as_deref() == Some(id.as_str()) {
                    return None;
                }
                let mut next = self.clone();
                next.selected_file_id = Some(id);
                Some(next)
            }
            AudioAction::ClearSelection => {
                self.selected_file_id.as_ref()?;
                let mut next = self.clone();
                next.selected_file_id = None;
                Some(next)
            }
            AudioAction::SetPlayingFile(id) => {
                if let Some(id) = id.as_deref() {
                    self.position(id)?;
                }
                let mut next = self.clone();
                next.currently_playing_id = id;
                next.recompute_playing();
                if next == *self {
                    return None;
                }
                Some(next)
            }
            AudioAction::UpdateFileMetadata { id, metadata } => {
                let idx = self.position(&id)?;
                let mut next = self.clone();
                next.files[idx].merge_metadata(metadata);
                Some(next)
            }
            AudioAction::ClearAllFiles => {
                if *self == AudioFileState::default() {
                    return None;
                }
                Some(AudioFileState::default())
            }
            AudioAction::RestoreSelection(id) => {
                if self.selected_file_id == id {
                    return None;
                }
                let mut next = self.clone();
                next.selected_file_id = id;
                Some(next)
            }
        }
    }
}

/// Handle to the application's audio files.
pub struct AudioFileStore {
    store: Store<AudioFileState>,
    persistence: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for AudioFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFileStore")
            .field("store", &self.store)
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

impl Default for AudioFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFileStore {
    /// Create an empty store that persists nothing.
    pub fn new() -> Self {
        Self {
            store: Store::new(AudioFileState::default()),
            persistence: None,
        }
    }

    /// Create a store whose selection is kept in `kv`.
    ///
    /// The persisted selection is restored immediately.  It may name a file
    /// that has not been added yet; it resolves once that file is added.
    pub fn with_persistence(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let restored: Option<PersistedAudioSelection> =
            load_slot(kv.as_ref(), PERSIST_SLOT, PERSIST_VERSION)?;
        let this = Self {
            store: Store::new(AudioFileState::default()),
            persistence: Some(kv),
        };
        if let Some(restored) = restored {
            this.store
                .dispatch(AudioAction::RestoreSelection(restored.selected_file_id));
        }
        Ok(this)
    }

    /// Add a file, replacing any record with the same id.
    pub fn add_file(&self, file: AudioFileRecord) -> bool {
        self.store.dispatch(AudioAction::AddFile(file))
    }

    /// Remove a file and clear any pointer to it.
    ///
    /// If the selection changes and cannot be written, nothing is removed.
    pub fn remove_file(&self, id: &str) -> Result<bool> {
        self.dispatch_persisted(AudioAction::RemoveFile(id.to_string()))
    }

    /// Select a file.  No-op if it does not exist.
    ///
    /// If the selection cannot be written, the old one stays.
    pub fn select_file(&self, id: &str) -> Result<bool> {
        self.dispatch_persisted(AudioAction::SelectFile(id.to_string()))
    }

    /// Clear the selection.
    pub fn clear_selection(&self) -> Result<bool> {
        self.dispatch_persisted(AudioAction::ClearSelection)
    }

    /// Play `id`, or stop playback with `None`.
    ///
    /// Every file's `is_playing` flag is recomputed, so at most one file is
    /// ever playing.  Unknown ids are ignored.
    pub fn set_playing_file(&self, id: Option<&str>) -> bool {
        self.store
            .dispatch(AudioAction::SetPlayingFile(id.map(String::from)))
    }

    /// Merge `metadata` into a file's metadata.
    pub fn update_file_metadata(&self, id: &str, metadata: Metadata) -> bool {
        self.store.dispatch(AudioAction::UpdateFileMetadata {
            id: id.to_string(),
            metadata,
        })
    }

    /// Drop every file and both pointers.
    pub fn clear_all_files(&self) -> Result<bool> {
        self.dispatch_persisted(AudioAction::ClearAllFiles)
    }

    /// A clone of the selected file.
    pub fn selected_file(&self) -> Option<AudioFileRecord> {
        self.store.with(|state| state.selected_file().cloned())
    }

    /// A clone of the playing file.
    pub fn currently_playing_file(&self) -> Option<AudioFileRecord> {
        self.store
            .with(|state| state.currently_playing_file().cloned())
    }

    /// A clone of one file.
    pub fn file_by_id(&self, id: &str) -> Option<AudioFileRecord> {
        self.store.with(|state| state.file_by_id(id).cloned())
    }

    /// All files in order.
    pub fn files(&self) -> Vec<AudioFileRecord> {
        self.store.with(|state| state.files.clone())
    }

    /// The selection pointer, resolved or not.
    pub fn selected_file_id(&self) -> Option<String> {
        self.store.with(|state| state.selected_file_id.clone())
    }

    /// The playing pointer.
    pub fn currently_playing_id(&self) -> Option<String> {
        self.store.with(|state| state.currently_playing_id.clone())
    }

    /// A clone of the whole state.
    pub fn snapshot(&self) -> AudioFileState {
        self.store.snapshot()
    }

    /// Observe future changes.
    pub fn subscribe(&self) -> Subscription<AudioFileState> {
        self.store.subscribe()
    }

    /// Apply `action`, writing the selection first if it changes.  A failed
    /// write leaves the store untouched.
    fn dispatch_persisted(&self, action: AudioAction) -> Result<bool> {
        self.store.dispatch_with(action, |before, after| {
            let selection = persistable(after);
            if persistable(before) == selection {
                return Ok(());
            }
            self.persist(&selection)
        })
    }

    fn persist(&self, selection: &PersistedAudioSelection) -> Result<()> {
        let Some(kv) = &self.persistence else {
            return Ok(());
        };
        match save_slot(kv.as_ref(), PERSIST_SLOT, PERSIST_VERSION, selection) {
            Ok(()) => {
                STORE_PERSIST_WRITES.click();
                Ok(())
            }
            Err(err) => {
                STORE_PERSIST_ERRORS.click();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryKeyValueStore;
    use serde_json::json;
    use time::OffsetDateTime;

    fn file(id: &str) -> AudioFileRecord {
        AudioFileRecord::new(id, format!("{id}.wav"), OffsetDateTime::UNIX_EPOCH)
    }

    fn store_with(ids: &[&str]) -> AudioFileStore {
        let store = AudioFileStore::new();
        for id in ids {
            store.add_file(file(id));
        }
        store
    }

    fn playing(store: &AudioFileStore) -> Vec<String> {
        store
            .files()
            .into_iter()
            .filter(|f| f.is_playing)
            .map(|f| f.id)
            .collect()
    }

    #[test]
    fn switching_playback_leaves_one_file_playing() {
        let store = store_with(&["x", "y", "z"]);
        assert!(store.set_playing_file(Some("x")));
        assert!(store.set_playing_file(Some("y")));
        assert_eq!(playing(&store), vec!["y".to_string()]);
        assert_eq!(store.currently_playing_id(), Some("y".to_string()));
        assert_eq!(store.currently_playing_file().unwrap().id, "y");
    }

    #[test]
    fn stopping_playback_clears_every_flag() {
        let store = store_with(&["x", "y"]);
        store.set_playing_file(Some("x"));
        assert!(store.set_playing_file(None));
        assert!(playing(&store).is_empty());
        assert_eq!(store.currently_playing_id(), None);
        assert!(!store.set_playing_file(None));
    }

    #[test]
    fn playing_unknown_file_is_noop() {
        let store = store_with(&["x"]);
        store.set_playing_file(Some("x"));
        assert!(!store.set_playing_file(Some("ghost")));
        assert_eq!(store.currently_playing_id(), Some("x".to_string()));
    }

    #[test]
    fn removing_selected_file_clears_selection() {
        let store = store_with(&["a", "b"]);
        assert!(store.select_file("a").unwrap());
        assert!(store.remove_file("a").unwrap());
        assert_eq!(store.selected_file_id(), None);
        assert!(store.selected_file().is_none());
        assert!(!store.remove_file("a").unwrap());
    }

    #[test]
    fn removing_playing_file_clears_playback() {
        let store = store_with(&["a", "b"]);
        store.set_playing_file(Some("b"));
        store.select_file("a").unwrap();
        store.remove_file("b").unwrap();
        assert_eq!(store.currently_playing_id(), None);
        assert_eq!(store.selected_file_id(), Some("a".to_string()));
    }

    #[test]
    fn add_file_replaces_in_place_and_keeps_playing_flag() {
        let store = store_with(&["a", "b"]);
        store.set_playing_file(Some("a"));
        assert!(store.add_file(file("a").with_path("/music/a.wav")));
        let files = store.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path.as_deref(), Some("/music/a.wav"));
        assert!(files[0].is_playing);
    }

    #[test]
    fn update_metadata_merges() {
        let store = store_with(&["a"]);
        let mut first = Metadata::new();
        first.insert("genre".into(), json!("ambient"));
        assert!(store.update_file_metadata("a", first));
        let mut second = Metadata::new();
        second.insert("bpm".into(), json!(70));
        assert!(store.update_file_metadata("a", second));
        let metadata = store.file_by_id("a").unwrap().metadata;
        assert_eq!(metadata["genre"], json!("ambient"));
        assert_eq!(metadata["bpm"], json!(70));
        assert!(!store.update_file_metadata("missing", Metadata::new()));
    }

    #[test]
    fn select_unknown_file_is_noop() {
        let store = store_with(&["a"]);
        assert!(!store.select_file("ghost").unwrap());
        assert_eq!(store.selected_file_id(), None);
    }

    #[test]
    fn clear_all_files_resets_everything() {
        let store = store_with(&["a", "b"]);
        store.select_file("a").unwrap();
        store.set_playing_file(Some("b"));
        assert!(store.clear_all_files().unwrap());
        assert_eq!(store.snapshot(), AudioFileState::default());
        assert!(!store.clear_all_files().unwrap());
    }

    #[test]
    fn persistable_holds_only_selection() {
        let store = store_with(&["a", "b"]);
        store.select_file("b").unwrap();
        store.set_playing_file(Some("a"));
        let persisted = store.store.with(persistable);
        assert_eq!(
            serde_json::to_value(&persisted).unwrap(),
            json!({"selected_file_id": "b"})
        );
    }

    #[test]
    fn selection_survives_restart_but_files_do_not() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let first = AudioFileStore::with_persistence(Arc::clone(&kv)).unwrap();
        first.add_file(file("a"));
        first.add_file(file("b"));
        first.select_file("b").unwrap();
        drop(first);

        let second = AudioFileStore::with_persistence(Arc::clone(&kv)).unwrap();
        assert!(second.files().is_empty());
        assert_eq!(second.selected_file_id(), Some("b".to_string()));
        assert!(second.selected_file().is_none());
        second.add_file(file("b"));
        assert_eq!(second.selected_file().unwrap().id, "b");
    }

    #[test]
    fn clearing_selection_is_persisted() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let store = AudioFileStore::with_persistence(Arc::clone(&kv)).unwrap();
        store.add_file(file("a"));
        store.select_file("a").unwrap();
        store.clear_selection().unwrap();
        let restored: Option<PersistedAudioSelection> =
            load_slot(kv.as_ref(), PERSIST_SLOT, PERSIST_VERSION).unwrap();
        assert_eq!(restored, Some(PersistedAudioSelection::default()));
    }

    /// Memory store whose writes start failing on request.
    #[derive(Default)]
    struct FlakyKeyValueStore {
        inner: MemoryKeyValueStore,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyKeyValueStore {
        fn fail_writes(&self) {
            self.failing
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl KeyValueStore for FlakyKeyValueStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::Error::io(
                    format!("failed to write {key}"),
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn failed_write_leaves_state_unchanged() {
        let kv = Arc::new(FlakyKeyValueStore::default());
        let store = AudioFileStore::with_persistence(kv.clone()).unwrap();
        store.add_file(file("a"));
        store.add_file(file("b"));
        store.select_file("a").unwrap();
        kv.fail_writes();
        let mut sub = store.subscribe();

        assert!(store.remove_file("a").is_err());
        assert!(store.file_by_id("a").is_some());
        assert_eq!(store.selected_file_id(), Some("a".to_string()));

        assert!(store.select_file("b").is_err());
        assert!(store.clear_all_files().is_err());
        assert_eq!(store.files().len(), 2);
        assert_eq!(store.selected_file_id(), Some("a".to_string()));
        assert!(!sub.has_changed());

        let on_disk: Option<PersistedAudioSelection> =
            load_slot(kv.as_ref(), PERSIST_SLOT, PERSIST_VERSION).unwrap();
        assert_eq!(on_disk.unwrap().selected_file_id, Some("a".to_string()));
    }

    #[test]
    fn changes_that_keep_the_selection_need_no_write() {
        let kv = Arc::new(FlakyKeyValueStore::default());
        let store = AudioFileStore::with_persistence(kv.clone()).unwrap();
        store.add_file(file("a"));
        store.add_file(file("b"));
        store.select_file("a").unwrap();
        kv.fail_writes();

        assert!(store.remove_file("b").unwrap());
        assert!(store.file_by_id("b").is_none());
        assert_eq!(store.selected_file_id(), Some("a".to_string()));
    }
}

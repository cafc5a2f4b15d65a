//! In-process store holding the serialized document as a string.
//!
//! Used by hosts that own file I/O themselves (they push edits in through
//! [`MemoryTodoStore::replace_document`]) and by tests. Clones share state.

use super::{StorageError, StoreResult, TodoStore, WatchCallback, Watchers};
use crate::codec::document::{deserialize_document, serialize_document, DecodedDocument};
use crate::event::bus::Subscription;
use crate::model::dates::now_millis;
use crate::model::todo::TodoItem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MemoryState {
    document: Option<String>,
    writes: usize,
    fail_writes: bool,
}

#[derive(Clone)]
pub struct MemoryTodoStore {
    path: String,
    state: Arc<Mutex<MemoryState>>,
    watchers: Watchers,
}

impl MemoryTodoStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: Arc::default(),
            watchers: Watchers::default(),
        }
    }

    /// Store whose document already holds `content`.
    pub fn with_document(path: impl Into<String>, content: impl Into<String>) -> Self {
        let store = Self::new(path);
        store.lock().document = Some(content.into());
        store
    }

    /// Current document text, if any.
    pub fn document(&self) -> Option<String> {
        self.lock().document.clone()
    }

    /// Replaces the document as an external editor would and fires watchers.
    pub fn replace_document(&self, content: impl Into<String>) {
        self.lock().document = Some(content.into());
        self.watchers.notify();
    }

    /// Makes subsequent `save_all` calls fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful `save_all` calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TodoStore for MemoryTodoStore {
    fn initialize(&mut self) -> StoreResult<()> {
        let mut state = self.lock();
        if state.document.is_none() {
            state.document = Some(serialize_document(&[], now_millis()));
        }
        Ok(())
    }

    fn read_all(&self) -> StoreResult<DecodedDocument> {
        let state = self.lock();
        let document = state
            .document
            .as_deref()
            .ok_or_else(|| StorageError::NotInitialized(self.path.clone()))?;
        Ok(deserialize_document(document))
    }

    fn save_all(&mut self, todos: &[TodoItem]) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StorageError::Unavailable(format!(
                "writes to `{}` are disabled",
                self.path
            )));
        }
        state.document = Some(serialize_document(todos, now_millis()));
        state.writes += 1;
        Ok(())
    }

    fn watch(&self, callback: WatchCallback) -> Subscription {
        self.watchers.add(callback)
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::todo::TodoDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn initialize_writes_header_once() {
        let mut store = MemoryTodoStore::with_document("todos.md", "title: existing");
        store.initialize().unwrap();
        assert_eq!(store.document().as_deref(), Some("title: existing"));

        let mut empty = MemoryTodoStore::new("todos.md");
        assert!(empty.read_all().is_err());
        empty.initialize().unwrap();
        assert!(empty.document().unwrap().starts_with("---\n"));
    }

    #[test]
    fn clones_share_document() {
        let mut store = MemoryTodoStore::new("todos.md");
        let observer = store.clone();
        store.initialize().unwrap();
        store
            .save_all(&[TodoItem::create(TodoDraft::titled("shared")).unwrap()])
            .unwrap();
        assert_eq!(observer.read_all().unwrap().todos.len(), 1);
        assert_eq!(observer.write_count(), 1);
    }

    #[test]
    fn failing_writes_keep_previous_document() {
        let mut store = MemoryTodoStore::new("todos.md");
        store.initialize().unwrap();
        let before = store.document();
        store.set_fail_writes(true);

        let result = store.save_all(&[TodoItem::create(TodoDraft::titled("lost")).unwrap()]);
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(store.document(), before);
    }

    #[test]
    fn replace_document_fires_watchers() {
        let store = MemoryTodoStore::new("todos.md");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let watch = store.watch(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        store.replace_document("title: from elsewhere");
        watch.unsubscribe();
        store.replace_document("title: again");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

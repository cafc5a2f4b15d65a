//! Cached to-do repository over a [`TodoStore`].
//!
//! # Responsibility
//! - Own the authoritative in-memory list.
//! - Write every mutation through to the store as one full rewrite.
//! - Stage `Updated`/`Deleted` events after a mutation is durable; callers
//!   publish them with `publish_pending` or `take_pending_events`.
//!
//! # Invariants
//! - The cache only changes after the store accepted the write, so a failed
//!   write leaves both cache and subscribers untouched.
//! - Staged events are in mutation order.
//! - Ids are unique within the cache.

use crate::codec::document::ParseWarning;
use crate::event::bus::{EventBus, Subscription};
use crate::event::todo_event::TodoEvent;
use crate::model::todo::TodoItem;
use crate::model::value::TodoId;
use crate::store::{StorageError, TodoStore, WatchCallback};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Storage(StorageError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

pub struct TodoRepository<S: TodoStore> {
    store: S,
    bus: EventBus,
    cache: Vec<TodoItem>,
    last_warnings: Vec<ParseWarning>,
    pending_events: Vec<TodoEvent>,
}

impl<S: TodoStore> TodoRepository<S> {
    /// Creates a repository. Nothing is read until `initialize`.
    pub fn new(store: S, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            cache: Vec::new(),
            last_warnings: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Prepares the store and loads the document into the cache.
    pub fn initialize(&mut self) -> RepoResult<()> {
        let started_at = Instant::now();
        if let Err(err) = self.store.initialize() {
            error!(
                "event=repo_init module=repo status=error path={} duration_ms={} error={}",
                self.store.path(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
        self.reload()?;
        info!(
            "event=repo_init module=repo status=ok path={} count={} warnings={} duration_ms={}",
            self.store.path(),
            self.cache.len(),
            self.last_warnings.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Discards the cache and re-reads the store.
    pub fn reload(&mut self) -> RepoResult<()> {
        let decoded = self.store.read_all()?;
        self.cache = decoded.todos;
        self.last_warnings = decoded.warnings;
        Ok(())
    }

    /// Reloads when the store reports an external change.
    pub fn sync_external_changes(&mut self) -> RepoResult<bool> {
        if !self.store.poll_changes()? {
            return Ok(false);
        }
        self.reload()?;
        info!(
            "event=repo_sync module=repo status=ok path={} count={}",
            self.store.path(),
            self.cache.len()
        );
        Ok(true)
    }

    /// All records. An empty cache is re-synced from the store first.
    pub fn find_all(&mut self) -> RepoResult<Vec<TodoItem>> {
        self.ensure_loaded()?;
        Ok(self.cache.clone())
    }

    pub fn find_by_id(&mut self, id: &TodoId) -> RepoResult<Option<TodoItem>> {
        self.ensure_loaded()?;
        Ok(self.cache.iter().find(|todo| todo.id() == id).cloned())
    }

    /// Inserts or replaces `todo` by id, then stages `Updated`.
    pub fn save(&mut self, todo: TodoItem) -> RepoResult<()> {
        self.ensure_loaded()?;
        let id = todo.id().clone();
        let mut next = self.cache.clone();
        match next.iter_mut().find(|existing| existing.id() == &id) {
            Some(slot) => *slot = todo,
            None => next.push(todo),
        }
        self.commit(next, "todo_save", &id)?;
        self.pending_events.push(TodoEvent::updated(id));
        Ok(())
    }

    /// Removes the record with `id`, staging `Deleted`. Returns `false` when
    /// it was absent.
    pub fn delete(&mut self, id: &TodoId) -> RepoResult<bool> {
        self.ensure_loaded()?;
        if !self.cache.iter().any(|todo| todo.id() == id) {
            return Ok(false);
        }
        let next: Vec<TodoItem> = self
            .cache
            .iter()
            .filter(|todo| todo.id() != id)
            .cloned()
            .collect();
        self.commit(next, "todo_delete", id)?;
        self.pending_events.push(TodoEvent::deleted(id.clone()));
        Ok(true)
    }

    /// Replaces the whole list with one write. Publishes nothing.
    pub fn save_all(&mut self, todos: Vec<TodoItem>) -> RepoResult<()> {
        let started_at = Instant::now();
        let count = todos.len();
        if let Err(err) = self.store.save_all(&todos) {
            error!(
                "event=todo_save_all module=repo status=error count={} duration_ms={} error={}",
                count,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
        self.cache = todos;
        info!(
            "event=todo_save_all module=repo status=ok count={} duration_ms={}",
            count,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Removes and returns staged events without publishing them.
    pub fn take_pending_events(&mut self) -> Vec<TodoEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Publishes staged events on the bus. Returns how many were published.
    pub fn publish_pending(&mut self) -> usize {
        let events = self.take_pending_events();
        for event in &events {
            self.bus.publish(event);
        }
        events.len()
    }

    /// Warnings from the most recent document read.
    pub fn last_warnings(&self) -> &[ParseWarning] {
        &self.last_warnings
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Empties the cache; the next read goes back to the store.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn store_path(&self) -> &str {
        self.store.path()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Forwards to the store's external-change watcher.
    pub fn watch_store(&self, callback: WatchCallback) -> Subscription {
        self.store.watch(callback)
    }

    fn ensure_loaded(&mut self) -> RepoResult<()> {
        if self.cache.is_empty() {
            self.reload()?;
        }
        Ok(())
    }

    fn commit(&mut self, next: Vec<TodoItem>, event: &str, id: &TodoId) -> RepoResult<()> {
        let started_at = Instant::now();
        if let Err(err) = self.store.save_all(&next) {
            error!(
                "event={} module=repo status=error id={} duration_ms={} error={}",
                event,
                id,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
        self.cache = next;
        info!(
            "event={} module=repo status=ok id={} count={} duration_ms={}",
            event,
            id,
            self.cache.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::todo_event::TodoEventKind;
    use crate::model::todo::TodoDraft;
    use crate::store::MemoryTodoStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn repo() -> (TodoRepository<MemoryTodoStore>, MemoryTodoStore) {
        let store = MemoryTodoStore::new("Todos/todos.md");
        let mut repo = TodoRepository::new(store.clone(), EventBus::new());
        repo.initialize().unwrap();
        (repo, store)
    }

    fn todo(title: &str) -> TodoItem {
        TodoItem::create(TodoDraft::titled(title)).unwrap()
    }

    #[test]
    fn save_inserts_then_replaces_by_id() {
        let (mut repo, store) = repo();
        let original = todo("first");
        repo.save(original.clone()).unwrap();
        let renamed = original.apply_patch(&crate::model::todo::TodoPatch {
            title: Some("renamed".to_string()),
            ..Default::default()
        });
        repo.save(renamed.unwrap()).unwrap();

        let all = repo.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title().as_str(), "renamed");
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn delete_reports_absence_without_writing() {
        let (mut repo, store) = repo();
        let item = todo("gone soon");
        repo.save(item.clone()).unwrap();

        assert!(repo.delete(item.id()).unwrap());
        assert!(!repo.delete(item.id()).unwrap());
        assert_eq!(store.write_count(), 2);
        assert_eq!(repo.find_by_id(item.id()).unwrap(), None);
    }

    #[test]
    fn failed_write_leaves_cache_and_subscribers_untouched() {
        let (mut repo, store) = repo();
        repo.save(todo("kept")).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = repo.events().subscribe(TodoEventKind::Updated, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        store.set_fail_writes(true);
        let err = repo.save(todo("lost")).unwrap_err();
        assert!(matches!(err, RepoError::Storage(StorageError::Unavailable(_))));
        assert_eq!(repo.cache_len(), 1);
        assert_eq!(repo.publish_pending(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_are_staged_until_published() {
        let (mut repo, _) = repo();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = repo.events().subscribe(TodoEventKind::Updated, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let item = todo("staged");
        repo.save(item.clone()).unwrap();
        repo.delete(item.id()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(repo.publish_pending(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(repo.take_pending_events().is_empty());
    }

    #[test]
    fn empty_cache_resyncs_from_store() {
        let (mut repo, store) = repo();
        store.replace_document("title: written elsewhere");
        assert_eq!(repo.cache_len(), 0);

        let all = repo.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title().as_str(), "written elsewhere");
    }

    #[test]
    fn reload_exposes_parse_warnings() {
        let (mut repo, store) = repo();
        store.replace_document("title: ok\n---\ndescription: no title here");
        repo.reload().unwrap();
        assert_eq!(repo.cache_len(), 1);
        assert_eq!(repo.last_warnings().len(), 1);

        repo.clear_cache();
        assert_eq!(repo.cache_len(), 0);
        assert_eq!(repo.store_path(), "Todos/todos.md");
    }
}

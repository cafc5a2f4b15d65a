//! Storage port for the persisted to-do document.
//!
//! # Responsibility
//! - Define the contract the repository uses to load and rewrite the list.
//! - Provide the on-disk vault store and an in-process store.
//!
//! # Invariants
//! - `save_all` replaces the whole document or leaves it untouched.
//! - Stores notify watchers only for changes they did not write themselves.

use crate::codec::document::DecodedDocument;
use crate::event::bus::Subscription;
use crate::model::todo::TodoItem;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

pub mod file_store;
pub mod memory_store;

pub use file_store::FileTodoStore;
pub use memory_store::MemoryTodoStore;

pub type StoreResult<T> = Result<T, StorageError>;

/// Callback fired when the backing document changed outside the store.
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// Backing resource failure. Surfaced to callers, never retried.
#[derive(Debug)]
pub enum StorageError {
    Io {
        path: String,
        source: std::io::Error,
    },
    /// Path would resolve outside the vault root.
    OutsideVault(String),
    NotInitialized(String),
    /// Store refused the operation.
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "storage i/o failed for `{path}`: {source}"),
            Self::OutsideVault(path) => write!(f, "path `{path}` escapes the vault root"),
            Self::NotInitialized(path) => write!(f, "store for `{path}` is not initialized"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Storage port used by [`crate::TodoRepository`].
pub trait TodoStore {
    /// Prepares the backing resource, creating an empty document if missing.
    fn initialize(&mut self) -> StoreResult<()>;

    /// Reads and parses the whole document.
    fn read_all(&self) -> StoreResult<DecodedDocument>;

    /// Atomically replaces the document with `todos`.
    fn save_all(&mut self, todos: &[TodoItem]) -> StoreResult<()>;

    /// Registers a callback for external changes.
    fn watch(&self, callback: WatchCallback) -> Subscription;

    /// Vault-relative path of the backing document.
    fn path(&self) -> &str;

    /// Checks for an external change, firing watchers when one is seen.
    ///
    /// Stores with push notification keep the default.
    fn poll_changes(&mut self) -> StoreResult<bool> {
        Ok(false)
    }
}

/// Shared watcher registry used by the bundled stores.
#[derive(Clone, Default)]
pub(crate) struct Watchers {
    inner: Arc<Mutex<WatcherTable>>,
}

#[derive(Default)]
struct WatcherTable {
    next_id: u64,
    callbacks: Vec<(u64, WatchCallback)>,
}

impl Watchers {
    pub(crate) fn add(&self, callback: WatchCallback) -> Subscription {
        let id = {
            let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            table.next_id += 1;
            let id = table.next_id;
            table.callbacks.push((id, callback));
            id
        };
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut table = inner.lock().unwrap_or_else(PoisonError::into_inner);
                table.callbacks.retain(|(callback_id, _)| *callback_id != id);
            }
        })
    }

    pub(crate) fn notify(&self) -> usize {
        let callbacks: Vec<WatchCallback> = {
            let table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            table.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }
}

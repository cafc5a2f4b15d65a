//! Vault-file store.
//!
//! # Responsibility
//! - Map a vault-relative path onto a file under the vault root.
//! - Rewrite the document atomically (temp file + rename in the same dir).
//! - Detect external edits by polling the file's modification stamp.
//!
//! # Invariants
//! - The resolved path never leaves the vault root.
//! - Existing path components are matched case-insensitively, so a vault
//!   that already holds `todos/Todos.md` is reused instead of duplicated.

use super::{StorageError, StoreResult, TodoStore, WatchCallback, Watchers};
use crate::codec::document::{deserialize_document, serialize_document, DecodedDocument};
use crate::event::bus::Subscription;
use crate::model::dates::now_millis;
use crate::model::todo::TodoItem;
use log::{error, info};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{Instant, SystemTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

/// Store backed by one document file inside a vault directory.
pub struct FileTodoStore {
    vault_root: PathBuf,
    relative_path: String,
    resolved: Option<PathBuf>,
    last_seen: Option<FileStamp>,
    watchers: Watchers,
}

impl FileTodoStore {
    /// Creates a store for `relative_path` under `vault_root`.
    ///
    /// Rejects absolute paths and paths containing `..`.
    pub fn new(vault_root: impl Into<PathBuf>, relative_path: &str) -> StoreResult<Self> {
        let relative = relative_path.trim().replace('\\', "/");
        let candidate = Path::new(&relative);
        let escapes = relative.is_empty()
            || candidate
                .components()
                .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StorageError::OutsideVault(relative_path.to_string()));
        }
        Ok(Self {
            vault_root: vault_root.into(),
            relative_path: relative,
            resolved: None,
            last_seen: None,
            watchers: Watchers::default(),
        })
    }

    /// Absolute file path, available after [`TodoStore::initialize`].
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    fn require_path(&self) -> StoreResult<&Path> {
        self.resolved
            .as_deref()
            .ok_or_else(|| StorageError::NotInitialized(self.relative_path.clone()))
    }
}

impl TodoStore for FileTodoStore {
    fn initialize(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();
        let path = resolve_case_insensitive(&self.vault_root, &self.relative_path);
        let created = !path.exists();
        if created {
            let outcome = path
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| write_atomic(&path, &serialize_document(&[], now_millis())));
            if let Err(err) = outcome {
                error!(
                    "event=store_init module=store status=error path={} duration_ms={} error={}",
                    self.relative_path,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(StorageError::io(self.relative_path.clone(), err));
            }
        }
        self.last_seen = file_stamp(&path);
        self.resolved = Some(path);
        info!(
            "event=store_init module=store status=ok path={} created={} duration_ms={}",
            self.relative_path,
            created,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn read_all(&self) -> StoreResult<DecodedDocument> {
        let path = self.require_path()?;
        let content = fs::read_to_string(path)
            .map_err(|err| StorageError::io(self.relative_path.clone(), err))?;
        Ok(deserialize_document(&content))
    }

    fn save_all(&mut self, todos: &[TodoItem]) -> StoreResult<()> {
        let started_at = Instant::now();
        let path = self.require_path()?.to_path_buf();
        let content = serialize_document(todos, now_millis());
        if let Err(err) = write_atomic(&path, &content) {
            error!(
                "event=store_write module=store status=error path={} count={} duration_ms={} error={}",
                self.relative_path,
                todos.len(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(StorageError::io(self.relative_path.clone(), err));
        }
        self.last_seen = file_stamp(&path);
        info!(
            "event=store_write module=store status=ok path={} count={} duration_ms={}",
            self.relative_path,
            todos.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn watch(&self, callback: WatchCallback) -> Subscription {
        self.watchers.add(callback)
    }

    fn path(&self) -> &str {
        &self.relative_path
    }

    fn poll_changes(&mut self) -> StoreResult<bool> {
        let path = self.require_path()?;
        let current = file_stamp(path);
        if current == self.last_seen {
            return Ok(false);
        }
        self.last_seen = current;
        let notified = self.watchers.notify();
        info!(
            "event=store_external_change module=store status=ok path={} watchers={}",
            self.relative_path, notified
        );
        Ok(true)
    }
}

fn file_stamp(path: &Path) -> Option<FileStamp> {
    let metadata = fs::metadata(path).ok()?;
    Some(FileStamp {
        modified: metadata.modified().ok(),
        len: metadata.len(),
    })
}

// Walks the relative path, reusing existing entries whose names differ only by case.
fn resolve_case_insensitive(root: &Path, relative: &str) -> PathBuf {
    let mut resolved = root.to_path_buf();
    let mut matching = true;
    for component in Path::new(relative).components() {
        let Component::Normal(name) = component else {
            continue;
        };
        let exact = resolved.join(name);
        if !matching || exact.exists() {
            resolved = exact;
            continue;
        }
        let wanted = name.to_string_lossy().to_lowercase();
        let found = fs::read_dir(&resolved).ok().and_then(|entries| {
            entries
                .filter_map(Result::ok)
                .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
                .map(|entry| entry.path())
        });
        match found {
            Some(path) => resolved = path,
            None => {
                matching = false;
                resolved = exact;
            }
        }
    }
    resolved
}

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(content.as_bytes())?;
        file.sync_all()
    });
    match written.and_then(|()| fs::rename(&temp_path, path)) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            Err(err)
        }
    }
}

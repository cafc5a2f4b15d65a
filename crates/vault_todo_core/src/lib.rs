//! Core domain logic for the vault to-do manager.
//! This crate is the single source of truth for record invariants and the
//! persisted document format.

pub mod codec;
pub mod config;
pub mod event;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use codec::document::{
    deserialize_document, serialize_document, DecodedDocument, ParseWarning, ParseWarningKind,
};
pub use codec::tasks_line::{parse_tasks_line, TasksLine};
pub use config::{SettingsError, SortKey, TodoSettings};
pub use event::bus::{EventBus, HandlerResult, PublishReport, Subscription};
pub use event::todo_event::{TodoEvent, TodoEventKind, TodoEventPayload};
pub use logging::{
    default_log_level, init_logging, logging_status, resolve_log_level, LoggingError,
};
pub use model::dates::{DateKind, TodoDates};
pub use model::todo::{Timestamps, TodoDraft, TodoItem, TodoParts, TodoPatch};
pub use model::value::{
    Description, NotePath, Priority, Title, TodoId, TodoStatus, TodoTags, ValidationError,
};
pub use repo::todo_repo::{RepoError, RepoResult, TodoRepository};
pub use service::todo_service::{
    ServiceResult, TodoFilter, TodoService, TodoServiceError, TodoStatistics, UpdateNotice,
    ViewMode,
};
pub use store::{FileTodoStore, MemoryTodoStore, StorageError, StoreResult, TodoStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

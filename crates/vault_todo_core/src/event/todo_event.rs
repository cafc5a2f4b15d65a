//! Domain events describing to-do mutations.

use crate::model::dates::now_millis;
use crate::model::value::{TodoId, TodoStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Subscription key for [`crate::EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TodoEventKind {
    Created,
    Updated,
    Deleted,
    StatusToggled,
    Completed,
    Cancelled,
}

impl TodoEventKind {
    pub const ALL: [TodoEventKind; 6] = [
        TodoEventKind::Created,
        TodoEventKind::Updated,
        TodoEventKind::Deleted,
        TodoEventKind::StatusToggled,
        TodoEventKind::Completed,
        TodoEventKind::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "todo_created",
            Self::Updated => "todo_updated",
            Self::Deleted => "todo_deleted",
            Self::StatusToggled => "todo_status_toggled",
            Self::Completed => "todo_completed",
            Self::Cancelled => "todo_cancelled",
        }
    }
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoEventPayload {
    Created,
    Updated,
    Deleted,
    StatusToggled { from: TodoStatus, to: TodoStatus },
    Completed { at: DateTime<Utc> },
    Cancelled { at: DateTime<Utc> },
}

/// One published mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub todo_id: TodoId,
    pub payload: TodoEventPayload,
}

impl TodoEvent {
    pub fn new(todo_id: TodoId, payload: TodoEventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: now_millis(),
            todo_id,
            payload,
        }
    }

    pub fn created(todo_id: TodoId) -> Self {
        Self::new(todo_id, TodoEventPayload::Created)
    }

    pub fn updated(todo_id: TodoId) -> Self {
        Self::new(todo_id, TodoEventPayload::Updated)
    }

    pub fn deleted(todo_id: TodoId) -> Self {
        Self::new(todo_id, TodoEventPayload::Deleted)
    }

    pub fn kind(&self) -> TodoEventKind {
        match self.payload {
            TodoEventPayload::Created => TodoEventKind::Created,
            TodoEventPayload::Updated => TodoEventKind::Updated,
            TodoEventPayload::Deleted => TodoEventKind::Deleted,
            TodoEventPayload::StatusToggled { .. } => TodoEventKind::StatusToggled,
            TodoEventPayload::Completed { .. } => TodoEventKind::Completed,
            TodoEventPayload::Cancelled { .. } => TodoEventKind::Cancelled,
        }
    }
}

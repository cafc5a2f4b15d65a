//! To-do record entity.
//!
//! # Responsibility
//! - Hold one canonical, fully typed to-do record.
//! - Provide copy-on-write updates that refresh `timestamps.updated`.
//! - Derive read-only projections (overdue, days remaining, search match).
//!
//! # Invariants
//! - `id` and `title` are never empty (enforced by their value objects).
//! - `timestamps.created == dates.created()`.
//! - Every copy-on-write update yields a strictly greater `updated` instant.

use crate::model::dates::{now_millis, truncate_millis, TodoDates};
use crate::model::value::{
    Description, NotePath, Priority, Title, TodoId, TodoStatus, TodoTags, ValidationError,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Creation/update instants of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Raw user input for a new to-do, validated by [`TodoItem::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoDraft {
    pub title: String,
    pub description: Option<String>,
    /// `None` lets the service apply its configured default.
    pub priority: Option<Priority>,
    pub due: Option<DateTime<Utc>>,
    pub scheduled: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub linked_note: Option<String>,
    /// Initial status; imported lines may already be done or cancelled.
    pub status: TodoStatus,
    /// Creation instant to keep instead of "now" (used by [`TodoItem::create`]).
    pub created: Option<DateTime<Utc>>,
    /// Completion instant for a completed draft; defaults to creation.
    pub completed: Option<DateTime<Utc>>,
    /// Cancellation instant for a cancelled draft; defaults to creation.
    pub cancelled: Option<DateTime<Utc>>,
}

impl TodoDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. Outer `None` keeps a field; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub due: Option<Option<DateTime<Utc>>>,
    pub scheduled: Option<Option<DateTime<Utc>>>,
    pub start: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub linked_note: Option<Option<String>>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Every field of a record, used when rebuilding one from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoParts {
    pub id: TodoId,
    pub title: Title,
    pub description: Option<Description>,
    pub priority: Priority,
    pub dates: TodoDates,
    pub tags: TodoTags,
    pub status: TodoStatus,
    pub linked_note: Option<NotePath>,
    pub updated: DateTime<Utc>,
}

/// Canonical to-do record. Built only through `create`/`from_parts`, so it
/// serializes to JSON but is never deserialized directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    id: TodoId,
    title: Title,
    description: Option<Description>,
    priority: Priority,
    dates: TodoDates,
    tags: TodoTags,
    status: TodoStatus,
    linked_note: Option<NotePath>,
    timestamps: Timestamps,
}

impl TodoItem {
    /// Validates a draft and creates a record with a fresh id.
    pub fn create(draft: TodoDraft) -> Result<Self, ValidationError> {
        let created = draft.created.unwrap_or_else(now_millis);
        Self::create_at(draft, created)
    }

    /// Same as [`TodoItem::create`] with an explicit creation instant.
    pub fn create_at(draft: TodoDraft, created: DateTime<Utc>) -> Result<Self, ValidationError> {
        let title = Title::new(&draft.title)?;
        let description = match draft.description.as_deref() {
            Some(value) => Description::optional(value)?,
            None => None,
        };
        let tags = TodoTags::from_vec(&draft.tags)?;
        let linked_note = draft.linked_note.as_deref().and_then(NotePath::optional);
        let mut dates = TodoDates::with_created(created)
            .with_due(draft.due)
            .with_scheduled(draft.scheduled)
            .with_start(draft.start);
        let created = dates.created();
        match draft.status {
            TodoStatus::Active => {}
            TodoStatus::Completed => {
                dates = dates.with_completed(Some(draft.completed.unwrap_or(created)));
            }
            TodoStatus::Cancelled => {
                dates = dates.with_cancelled(Some(draft.cancelled.unwrap_or(created)));
            }
        }

        Ok(Self {
            id: TodoId::generate(),
            title,
            description,
            priority: draft.priority.unwrap_or_default(),
            dates,
            tags,
            status: draft.status,
            linked_note,
            timestamps: Timestamps {
                created,
                updated: created,
            },
        })
    }

    /// Rebuilds a record from already-validated parts.
    pub fn from_parts(parts: TodoParts) -> Self {
        let created = parts.dates.created();
        Self {
            id: parts.id,
            title: parts.title,
            description: parts.description,
            priority: parts.priority,
            dates: parts.dates,
            tags: parts.tags,
            status: parts.status,
            linked_note: parts.linked_note,
            timestamps: Timestamps {
                created,
                updated: truncate_millis(parts.updated),
            },
        }
    }

    pub fn id(&self) -> &TodoId {
        &self.id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn description(&self) -> Option<&Description> {
        self.description.as_ref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn dates(&self) -> &TodoDates {
        &self.dates
    }

    pub fn tags(&self) -> &TodoTags {
        &self.tags
    }

    pub fn status(&self) -> TodoStatus {
        self.status
    }

    pub fn linked_note(&self) -> Option<&NotePath> {
        self.linked_note.as_ref()
    }

    pub fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.is_cancelled()
    }

    /// Due in the past and not completed.
    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.dates.due() {
            Some(due) => !self.is_completed() && due < now,
            None => false,
        }
    }

    /// Whole days until due, rounded up. `None` without a due date.
    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let due = self.dates.due()?;
        let millis = (due - now).num_milliseconds();
        let day = Duration::days(1).num_milliseconds();
        Some(millis.div_euclid(day) + i64::from(millis.rem_euclid(day) != 0))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Case-insensitive substring match over title and description.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.as_str().to_lowercase().contains(&needle)
            || self
                .description
                .as_ref()
                .is_some_and(|d| d.as_str().to_lowercase().contains(&needle))
    }

    pub fn with_title(&self, title: Title) -> Self {
        self.touched(Self {
            title,
            ..self.clone()
        })
    }

    pub fn with_description(&self, description: Option<Description>) -> Self {
        self.touched(Self {
            description,
            ..self.clone()
        })
    }

    pub fn with_priority(&self, priority: Priority) -> Self {
        self.touched(Self {
            priority,
            ..self.clone()
        })
    }

    /// Replaces the optional dates. The creation instant is kept.
    pub fn with_dates(&self, dates: TodoDates) -> Self {
        let dates = TodoDates::with_created(self.dates.created())
            .with_due(dates.due())
            .with_scheduled(dates.scheduled())
            .with_start(dates.start())
            .with_completed(dates.completed())
            .with_cancelled(dates.cancelled());
        self.touched(Self {
            dates,
            ..self.clone()
        })
    }

    pub fn with_tags(&self, tags: TodoTags) -> Self {
        self.touched(Self {
            tags,
            ..self.clone()
        })
    }

    pub fn with_linked_note(&self, linked_note: Option<NotePath>) -> Self {
        self.touched(Self {
            linked_note,
            ..self.clone()
        })
    }

    /// Applies a validated patch as one update.
    pub fn apply_patch(&self, patch: &TodoPatch) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = Title::new(title)?;
        }
        if let Some(description) = &patch.description {
            next.description = match description.as_deref() {
                Some(value) => Description::optional(value)?,
                None => None,
            };
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(due) = patch.due {
            next.dates = next.dates.with_due(due);
        }
        if let Some(scheduled) = patch.scheduled {
            next.dates = next.dates.with_scheduled(scheduled);
        }
        if let Some(start) = patch.start {
            next.dates = next.dates.with_start(start);
        }
        if let Some(tags) = &patch.tags {
            next.tags = TodoTags::from_vec(tags)?;
        }
        if let Some(linked_note) = &patch.linked_note {
            next.linked_note = linked_note.as_deref().and_then(NotePath::optional);
        }
        Ok(self.touched(next))
    }

    /// Marks completed and stamps `dates.completed`. No-op when already completed.
    pub fn completed(&self) -> Self {
        if self.is_completed() {
            return self.clone();
        }
        let now = self.next_update_instant();
        let mut next = self.clone();
        next.status = TodoStatus::Completed;
        next.dates = next.dates.with_completed(Some(now));
        next.timestamps.updated = now;
        next
    }

    /// Marks active and clears `dates.completed`. No-op when already active.
    pub fn activated(&self) -> Self {
        if self.is_active() {
            return self.clone();
        }
        let now = self.next_update_instant();
        let mut next = self.clone();
        next.status = TodoStatus::Active;
        next.dates = next.dates.with_completed(None);
        next.timestamps.updated = now;
        next
    }

    /// Marks cancelled and stamps `dates.cancelled`. No-op when already cancelled.
    pub fn cancelled(&self) -> Self {
        if self.is_cancelled() {
            return self.clone();
        }
        let now = self.next_update_instant();
        let mut next = self.clone();
        next.status = TodoStatus::Cancelled;
        next.dates = next.dates.with_cancelled(Some(now));
        next.timestamps.updated = now;
        next
    }

    fn touched(&self, mut next: Self) -> Self {
        next.timestamps.updated = self.next_update_instant();
        next
    }

    // `updated` must move forward even when two updates land in the same millisecond.
    fn next_update_instant(&self) -> DateTime<Utc> {
        let now = now_millis();
        let floor = self.timestamps.updated + Duration::milliseconds(1);
        now.max(floor)
    }
}

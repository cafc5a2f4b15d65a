//! To-do use-case service.
//!
//! # Responsibility
//! - Provide the UI-facing read/write API over the repository.
//! - Enforce the status machine (`active ⇄ completed`, `→ cancelled` terminal).
//! - Queue one update notice per successful mutation and deliver queued
//!   notices when the host calls `flush_notifications`.
//!
//! # Invariants
//! - Every repository access goes through one mutex; at most one storage
//!   write is in flight.
//! - Notices are queued only after the write succeeded. Neither bus handlers
//!   nor update listeners run while the repository lock is held.
//! - Completed and cancelled records are not edited in place.

use crate::codec::document::ParseWarning;
use crate::codec::tasks_line::parse_tasks_line;
use crate::config::{SortKey, TodoSettings};
use crate::event::bus::{EventBus, Subscription};
use crate::event::todo_event::{TodoEvent, TodoEventKind, TodoEventPayload};
use crate::model::dates::now_millis;
use crate::model::todo::{TodoDraft, TodoItem, TodoPatch};
use crate::model::value::{Priority, TodoId, TodoStatus, ValidationError};
use crate::repo::todo_repo::{RepoError, TodoRepository};
use crate::store::{StorageError, TodoStore};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::{BTreeSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

pub type ServiceResult<T> = Result<T, TodoServiceError>;

#[derive(Debug)]
pub enum TodoServiceError {
    Validation(ValidationError),
    Storage(StorageError),
    NotFound(TodoId),
    /// Record is completed or cancelled and cannot be edited.
    NotEditable { id: TodoId, status: TodoStatus },
    /// Requested status change is not allowed from the current status.
    InvalidTransition {
        id: TodoId,
        from: TodoStatus,
        action: &'static str,
    },
}

impl Display for TodoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "todo not found: {id}"),
            Self::NotEditable { id, status } => {
                write!(f, "todo {id} is {status} and cannot be edited")
            }
            Self::InvalidTransition { id, from, action } => {
                write!(f, "cannot {action} todo {id} while it is {from}")
            }
        }
    }
}

impl Error for TodoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for TodoServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for TodoServiceError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<RepoError> for TodoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Storage(err) => Self::Storage(err),
        }
    }
}

/// Status subset shown by a list view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    All,
    Active,
    Completed,
    Cancelled,
}

impl ViewMode {
    fn admits(self, todo: &TodoItem) -> bool {
        match self {
            Self::All => true,
            Self::Active => todo.is_active(),
            Self::Completed => todo.is_completed(),
            Self::Cancelled => todo.is_cancelled(),
        }
    }
}

/// Conjunctive list filter. `None`/`false` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub view: ViewMode,
    pub tag: Option<String>,
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
    pub priority: Option<Priority>,
    pub overdue_only: bool,
}

impl TodoFilter {
    pub fn matches(&self, todo: &TodoItem, now: DateTime<Utc>) -> bool {
        self.view.admits(todo)
            && self.tag.as_deref().map_or(true, |tag| todo.has_tag(tag))
            && self
                .search
                .as_deref()
                .map_or(true, |query| todo.matches_search(query))
            && self.priority.map_or(true, |p| todo.priority() == p)
            && (!self.overdue_only || todo.is_overdue_at(now))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoStatistics {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub overdue: usize,
    /// `round(completed / total * 100)`, 0 for an empty list.
    pub completion_rate: u32,
}

/// One queued notification, delivered by `flush_notifications`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateNotice {
    /// A single record changed; `events` describe the change.
    Mutation {
        todo_id: TodoId,
        events: Vec<TodoEvent>,
    },
    /// Completed records were removed in one rewrite.
    ClearedCompleted { removed: Vec<TodoId> },
    /// The document changed outside the service and was reloaded.
    Reloaded,
}

pub type UpdateListener = Arc<dyn Fn(&UpdateNotice) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: Vec<(u64, UpdateListener)>,
}

// Repository-level kinds are published synchronously by the repository.
fn published_on_flush(kind: TodoEventKind) -> bool {
    !matches!(kind, TodoEventKind::Updated | TodoEventKind::Deleted)
}

pub struct TodoService<S: TodoStore> {
    repo: Mutex<TodoRepository<S>>,
    bus: EventBus,
    settings: RwLock<TodoSettings>,
    listeners: Arc<Mutex<ListenerTable>>,
    pending: Mutex<VecDeque<UpdateNotice>>,
}

impl<S: TodoStore> TodoService<S> {
    pub fn new(store: S, settings: TodoSettings) -> Self {
        Self::with_bus(store, EventBus::new(), settings)
    }

    /// Creates a service publishing on an existing bus.
    pub fn with_bus(store: S, bus: EventBus, settings: TodoSettings) -> Self {
        Self {
            repo: Mutex::new(TodoRepository::new(store, bus.clone())),
            bus,
            settings: RwLock::new(settings),
            listeners: Arc::default(),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Prepares the store and loads the document.
    pub fn initialize(&self) -> ServiceResult<()> {
        self.repo()?.initialize()?;
        Ok(())
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn settings(&self) -> TodoSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_settings(&self, settings: TodoSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Parse warnings from the last document load.
    pub fn last_warnings(&self) -> ServiceResult<Vec<ParseWarning>> {
        Ok(self.repo()?.last_warnings().to_vec())
    }

    pub fn store_path(&self) -> ServiceResult<String> {
        Ok(self.repo()?.store_path().to_string())
    }

    pub fn get_all_todos(&self) -> ServiceResult<Vec<TodoItem>> {
        Ok(self.repo()?.find_all()?)
    }

    pub fn get_active_todos(&self) -> ServiceResult<Vec<TodoItem>> {
        self.collect(|todo| todo.is_active())
    }

    pub fn get_completed_todos(&self) -> ServiceResult<Vec<TodoItem>> {
        self.collect(|todo| todo.is_completed())
    }

    pub fn get_todo_by_id(&self, id: &TodoId) -> ServiceResult<Option<TodoItem>> {
        Ok(self.repo()?.find_by_id(id)?)
    }

    /// Distinct tags across all records, sorted.
    pub fn get_all_tags(&self) -> ServiceResult<Vec<String>> {
        let todos = self.get_all_todos()?;
        let tags: BTreeSet<String> = todos
            .iter()
            .flat_map(|todo| todo.tags().iter().map(str::to_string))
            .collect();
        Ok(tags.into_iter().collect())
    }

    pub fn get_todos_by_tag(&self, tag: &str) -> ServiceResult<Vec<TodoItem>> {
        self.collect(|todo| todo.has_tag(tag))
    }

    pub fn get_todos_by_priority(&self, priority: Priority) -> ServiceResult<Vec<TodoItem>> {
        self.collect(|todo| todo.priority() == priority)
    }

    pub fn get_overdue_todos(&self) -> ServiceResult<Vec<TodoItem>> {
        let now = Utc::now();
        self.collect(|todo| todo.is_overdue_at(now))
    }

    pub fn filter_todos(&self, filter: &TodoFilter) -> ServiceResult<Vec<TodoItem>> {
        let now = Utc::now();
        self.collect(|todo| filter.matches(todo, now))
    }

    /// Records as a list view shows them under the current settings.
    pub fn visible_todos(&self) -> ServiceResult<Vec<TodoItem>> {
        let settings = self.settings();
        let todos = self.collect(|todo| settings.show_completed || !todo.is_completed())?;
        Ok(Self::sort_todos(todos, settings.sort_by))
    }

    /// Stable sort by `key`.
    pub fn sort_todos(mut todos: Vec<TodoItem>, key: SortKey) -> Vec<TodoItem> {
        match key {
            SortKey::DueDate => todos.sort_by(|a, b| match (a.dates().due(), b.dates().due()) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
            SortKey::Priority => todos.sort_by(|a, b| b.priority().cmp(&a.priority())),
            SortKey::CreatedAt => {
                todos.sort_by(|a, b| b.dates().created().cmp(&a.dates().created()))
            }
            SortKey::Title => todos.sort_by_cached_key(|todo| todo.title().as_str().to_lowercase()),
        }
        todos
    }

    pub fn get_statistics(&self) -> ServiceResult<TodoStatistics> {
        let todos = self.get_all_todos()?;
        let now = Utc::now();
        let mut stats = TodoStatistics {
            total: todos.len(),
            ..TodoStatistics::default()
        };
        for todo in &todos {
            match todo.status() {
                TodoStatus::Active => stats.active += 1,
                TodoStatus::Completed => stats.completed += 1,
                TodoStatus::Cancelled => stats.cancelled += 1,
            }
            if todo.is_overdue_at(now) {
                stats.overdue += 1;
            }
        }
        if stats.total > 0 {
            stats.completion_rate =
                ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u32;
        }
        Ok(stats)
    }

    /// Creates a record. A draft without priority gets the configured default.
    pub fn add_todo(&self, mut draft: TodoDraft) -> ServiceResult<TodoItem> {
        if draft.priority.is_none() {
            draft.priority = Some(self.settings().default_priority);
        }
        let todo = TodoItem::create(draft)?;
        self.mutate(|repo| Ok(repo.save(todo.clone())?))?;
        info!(
            "event=todo_add module=service status=ok id={} priority={}",
            todo.id(),
            todo.priority()
        );
        self.queue_mutation(todo.id(), vec![TodoEvent::created(todo.id().clone())]);
        Ok(todo)
    }

    /// Creates a record from selected editor text.
    ///
    /// The first non-blank line is parsed as a task line and becomes the
    /// title; remaining lines become the description. `note` links the
    /// record back to the document the text came from.
    pub fn add_todo_from_selection(
        &self,
        text: &str,
        note: Option<&str>,
    ) -> ServiceResult<TodoItem> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let first = lines.next().unwrap_or_default();
        let rest: Vec<&str> = lines.collect();

        let mut draft = parse_tasks_line(first).to_draft();
        if !rest.is_empty() {
            draft.description = Some(rest.join("\n"));
        }
        draft.linked_note = note.map(str::to_string);
        self.add_todo(draft)
    }

    /// Creates a record from one Tasks-format line.
    pub fn add_todo_from_tasks_line(&self, line: &str) -> ServiceResult<TodoItem> {
        self.add_todo(parse_tasks_line(line).to_draft())
    }

    /// Applies `patch` to an active record.
    pub fn update_todo(&self, id: &TodoId, patch: &TodoPatch) -> ServiceResult<TodoItem> {
        let (updated, changed) = self.mutate(|repo| {
            let current = find_existing(repo, id)?;
            if !current.is_active() {
                return Err(TodoServiceError::NotEditable {
                    id: id.clone(),
                    status: current.status(),
                });
            }
            if patch.is_empty() {
                return Ok((current, false));
            }
            let updated = current.apply_patch(patch)?;
            repo.save(updated.clone())?;
            Ok((updated, true))
        })?;
        if changed {
            self.queue_mutation(id, vec![TodoEvent::updated(id.clone())]);
        }
        Ok(updated)
    }

    pub fn delete_todo(&self, id: &TodoId) -> ServiceResult<()> {
        if !self.mutate(|repo| Ok(repo.delete(id)?))? {
            return Err(TodoServiceError::NotFound(id.clone()));
        }
        info!("event=todo_delete module=service status=ok id={}", id);
        self.queue_mutation(id, vec![TodoEvent::deleted(id.clone())]);
        Ok(())
    }

    /// Flips `active ⇄ completed`. Cancelled records are rejected.
    pub fn toggle_complete(&self, id: &TodoId) -> ServiceResult<TodoItem> {
        let (from, toggled) = self.mutate(|repo| {
            let current = find_existing(repo, id)?;
            let toggled = match current.status() {
                TodoStatus::Active => current.completed(),
                TodoStatus::Completed => current.activated(),
                TodoStatus::Cancelled => {
                    return Err(TodoServiceError::InvalidTransition {
                        id: id.clone(),
                        from: TodoStatus::Cancelled,
                        action: "toggle",
                    })
                }
            };
            repo.save(toggled.clone())?;
            Ok((current.status(), toggled))
        })?;

        let mut events = vec![TodoEvent::new(
            id.clone(),
            TodoEventPayload::StatusToggled {
                from,
                to: toggled.status(),
            },
        )];
        if let Some(at) = toggled.dates().completed() {
            events.push(TodoEvent::new(id.clone(), TodoEventPayload::Completed { at }));
        }
        info!(
            "event=todo_toggle module=service status=ok id={} from={} to={}",
            id,
            from,
            toggled.status()
        );
        self.queue_mutation(id, events);
        Ok(toggled)
    }

    /// Moves an active or completed record to the terminal cancelled status.
    pub fn cancel_todo(&self, id: &TodoId) -> ServiceResult<TodoItem> {
        let cancelled = self.mutate(|repo| {
            let current = find_existing(repo, id)?;
            if current.is_cancelled() {
                return Err(TodoServiceError::InvalidTransition {
                    id: id.clone(),
                    from: TodoStatus::Cancelled,
                    action: "cancel",
                });
            }
            let cancelled = current.cancelled();
            repo.save(cancelled.clone())?;
            Ok(cancelled)
        })?;
        let at = cancelled.dates().cancelled().unwrap_or_else(now_millis);
        info!("event=todo_cancel module=service status=ok id={}", id);
        self.queue_mutation(
            id,
            vec![TodoEvent::new(id.clone(), TodoEventPayload::Cancelled { at })],
        );
        Ok(cancelled)
    }

    /// Removes every completed record in one write. Returns how many.
    pub fn clear_completed(&self) -> ServiceResult<usize> {
        let removed: Vec<TodoId> = {
            let mut repo = self.repo()?;
            let (completed, kept): (Vec<TodoItem>, Vec<TodoItem>) = repo
                .find_all()?
                .into_iter()
                .partition(|todo| todo.is_completed());
            if completed.is_empty() {
                return Ok(0);
            }
            repo.save_all(kept)?;
            completed.iter().map(|todo| todo.id().clone()).collect()
        };
        info!(
            "event=todo_clear_completed module=service status=ok count={}",
            removed.len()
        );
        let count = removed.len();
        self.enqueue(UpdateNotice::ClearedCompleted { removed });
        Ok(count)
    }

    /// Reloads after an external edit when auto refresh is enabled.
    pub fn sync_external_changes(&self) -> ServiceResult<bool> {
        if !self.settings().auto_refresh {
            return Ok(false);
        }
        let changed = self.repo()?.sync_external_changes()?;
        if changed {
            self.enqueue(UpdateNotice::Reloaded);
        }
        Ok(changed)
    }

    /// Registers a listener called once per delivered notice.
    pub fn on_update(
        &self,
        listener: impl Fn(&UpdateNotice) + Send + Sync + 'static,
    ) -> Subscription {
        let id = {
            let mut table = lock_or_recover(&self.listeners);
            table.next_id += 1;
            let id = table.next_id;
            table.listeners.push((id, Arc::new(listener)));
            id
        };
        let weak = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                lock_or_recover(&listeners)
                    .listeners
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    pub fn pending_notifications(&self) -> usize {
        lock_or_recover(&self.pending).len()
    }

    /// Delivers queued notices in order. Returns how many were delivered.
    ///
    /// Domain events other than `Updated`/`Deleted` are published on the
    /// bus here; listeners may call back into the service.
    pub fn flush_notifications(&self) -> usize {
        let notices: Vec<UpdateNotice> = lock_or_recover(&self.pending).drain(..).collect();
        for notice in &notices {
            if let UpdateNotice::Mutation { events, .. } = notice {
                for event in events.iter().filter(|event| published_on_flush(event.kind())) {
                    self.bus.publish(event);
                }
            }
            let listeners: Vec<UpdateListener> = lock_or_recover(&self.listeners)
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                if catch_unwind(AssertUnwindSafe(|| (listener.as_ref())(notice))).is_err() {
                    warn!(
                        "event=update_listener module=service status=error error=listener_panicked"
                    );
                }
            }
        }
        notices.len()
    }

    /// Runs `mutation` under the repository lock, then publishes the events
    /// the repository staged once the lock is released.
    fn mutate<T>(
        &self,
        mutation: impl FnOnce(&mut TodoRepository<S>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let (outcome, staged) = {
            let mut repo = self.repo()?;
            let outcome = mutation(&mut *repo);
            (outcome, repo.take_pending_events())
        };
        for event in &staged {
            self.bus.publish(event);
        }
        outcome
    }

    fn repo(&self) -> ServiceResult<MutexGuard<'_, TodoRepository<S>>> {
        self.repo.lock().map_err(|_| {
            TodoServiceError::Storage(StorageError::Unavailable(
                "todo repository lock poisoned".to_string(),
            ))
        })
    }

    fn collect(&self, keep: impl Fn(&TodoItem) -> bool) -> ServiceResult<Vec<TodoItem>> {
        Ok(self.get_all_todos()?.into_iter().filter(|todo| keep(todo)).collect())
    }

    fn queue_mutation(&self, id: &TodoId, events: Vec<TodoEvent>) {
        self.enqueue(UpdateNotice::Mutation {
            todo_id: id.clone(),
            events,
        });
    }

    fn enqueue(&self, notice: UpdateNotice) {
        lock_or_recover(&self.pending).push_back(notice);
    }
}

fn find_existing<S: TodoStore>(
    repo: &mut TodoRepository<S>,
    id: &TodoId,
) -> ServiceResult<TodoItem> {
    repo.find_by_id(id)?
        .ok_or_else(|| TodoServiceError::NotFound(id.clone()))
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTodoStore;
    use chrono::{Duration, TimeZone};

    fn service() -> TodoService<MemoryTodoStore> {
        let service = TodoService::new(
            MemoryTodoStore::new("Todos/todos.md"),
            TodoSettings::default(),
        );
        service.initialize().unwrap();
        service
    }

    fn titled(title: &str) -> TodoItem {
        TodoItem::create(TodoDraft::titled(title)).unwrap()
    }

    #[test]
    fn add_uses_configured_default_priority() {
        let service = service();
        service.set_settings(TodoSettings {
            default_priority: Priority::Low,
            ..TodoSettings::default()
        });
        let todo = service.add_todo(TodoDraft::titled("water plants")).unwrap();
        assert_eq!(todo.priority(), Priority::Low);

        let mut explicit = TodoDraft::titled("urgent");
        explicit.priority = Some(Priority::Highest);
        assert_eq!(
            service.add_todo(explicit).unwrap().priority(),
            Priority::Highest
        );
    }

    #[test]
    fn completed_records_are_not_editable() {
        let service = service();
        let todo = service.add_todo(TodoDraft::titled("report")).unwrap();
        service.toggle_complete(todo.id()).unwrap();

        let patch = TodoPatch {
            title: Some("edited".to_string()),
            ..TodoPatch::default()
        };
        let err = service.update_todo(todo.id(), &patch).unwrap_err();
        assert!(matches!(
            err,
            TodoServiceError::NotEditable {
                status: TodoStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn cancelled_is_terminal() {
        let service = service();
        let todo = service.add_todo(TodoDraft::titled("trip")).unwrap();
        let cancelled = service.cancel_todo(todo.id()).unwrap();
        assert!(cancelled.is_cancelled());
        assert!(cancelled.dates().cancelled().is_some());

        assert!(matches!(
            service.toggle_complete(todo.id()),
            Err(TodoServiceError::InvalidTransition { action: "toggle", .. })
        ));
        assert!(matches!(
            service.cancel_todo(todo.id()),
            Err(TodoServiceError::InvalidTransition { action: "cancel", .. })
        ));
    }

    #[test]
    fn missing_ids_are_reported() {
        let service = service();
        let ghost = TodoId::generate();
        assert!(matches!(
            service.delete_todo(&ghost),
            Err(TodoServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.toggle_complete(&ghost),
            Err(TodoServiceError::NotFound(_))
        ));
        assert_eq!(service.get_todo_by_id(&ghost).unwrap(), None);
    }

    #[test]
    fn selection_becomes_linked_record() {
        let service = service();
        let todo = service
            .add_todo_from_selection(
                "\n- [ ] Email landlord ⏫ #home\nask about the heating\n",
                Some("Daily/2024-06-01.md"),
            )
            .unwrap();
        assert_eq!(todo.title().as_str(), "Email landlord #home");
        assert_eq!(todo.priority(), Priority::High);
        assert_eq!(
            todo.description().map(|d| d.as_str()),
            Some("ask about the heating")
        );
        assert_eq!(
            todo.linked_note().map(|n| n.file_name()),
            Some("2024-06-01.md")
        );
        assert!(todo.has_tag("home"));
    }

    #[test]
    fn tags_are_distinct_and_sorted() {
        let service = service();
        for (title, tags) in [("a", vec!["work", "b"]), ("b", vec!["a", "work"])] {
            let mut draft = TodoDraft::titled(title);
            draft.tags = tags.into_iter().map(str::to_string).collect();
            service.add_todo(draft).unwrap();
        }
        assert_eq!(service.get_all_tags().unwrap(), vec!["a", "b", "work"]);
        assert_eq!(service.get_todos_by_tag("work").unwrap().len(), 2);
    }

    #[test]
    fn priority_and_title_sorts() {
        let mut low = TodoDraft::titled("beta");
        low.priority = Some(Priority::Low);
        let mut high = TodoDraft::titled("Alpha");
        high.priority = Some(Priority::High);
        let todos = vec![
            TodoItem::create(low).unwrap(),
            TodoItem::create(high).unwrap(),
            titled("gamma"),
        ];

        let by_priority = TodoService::<MemoryTodoStore>::sort_todos(todos.clone(), SortKey::Priority);
        let titles: Vec<&str> = by_priority.iter().map(|t| t.title().as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "gamma", "beta"]);

        let by_title = TodoService::<MemoryTodoStore>::sort_todos(todos, SortKey::Title);
        let titles: Vec<&str> = by_title.iter().map(|t| t.title().as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let older = TodoItem::create_at(TodoDraft::titled("older"), base).unwrap();
        let newer =
            TodoItem::create_at(TodoDraft::titled("newer"), base + Duration::days(1)).unwrap();
        let sorted =
            TodoService::<MemoryTodoStore>::sort_todos(vec![older, newer], SortKey::CreatedAt);
        assert_eq!(sorted[0].title().as_str(), "newer");
    }

    #[test]
    fn filter_combines_criteria() {
        let service = service();
        let mut draft = TodoDraft::titled("Quarterly report");
        draft.tags = vec!["work".to_string()];
        draft.priority = Some(Priority::High);
        draft.due = Some(Utc::now() - Duration::days(2));
        service.add_todo(draft).unwrap();
        service.add_todo(TodoDraft::titled("quarterly dentist")).unwrap();

        let filter = TodoFilter {
            view: ViewMode::Active,
            tag: Some("work".to_string()),
            search: Some("QUARTERLY".to_string()),
            priority: Some(Priority::High),
            overdue_only: true,
        };
        let matched = service.filter_todos(&filter).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title().as_str(), "Quarterly report");

        let search_only = TodoFilter {
            search: Some("quarterly".to_string()),
            ..TodoFilter::default()
        };
        assert_eq!(service.filter_todos(&search_only).unwrap().len(), 2);
    }

    #[test]
    fn visible_todos_respects_show_completed() {
        let service = service();
        let done = service.add_todo(TodoDraft::titled("done")).unwrap();
        service.add_todo(TodoDraft::titled("open")).unwrap();
        service.toggle_complete(done.id()).unwrap();

        assert_eq!(service.visible_todos().unwrap().len(), 2);
        service.set_settings(TodoSettings {
            show_completed: false,
            ..TodoSettings::default()
        });
        let visible = service.visible_todos().unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title().as_str(), "open");
    }

    #[test]
    fn statistics_count_each_status() {
        let service = service();
        let first = service.add_todo(TodoDraft::titled("one")).unwrap();
        let second = service.add_todo(TodoDraft::titled("two")).unwrap();
        service.add_todo(TodoDraft::titled("three")).unwrap();
        service.toggle_complete(first.id()).unwrap();
        service.cancel_todo(second.id()).unwrap();

        let stats = service.get_statistics().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(TodoStatistics::default().completion_rate, 0);
    }
}

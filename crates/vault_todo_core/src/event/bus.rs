//! In-process publish/subscribe keyed by event kind.
//!
//! # Responsibility
//! - Decouple repository/service mutations from UI refresh code.
//! - Deliver every event to every handler registered for its kind.
//!
//! # Invariants
//! - A failing or panicking handler never prevents the remaining handlers
//!   from running, and its failure is never re-raised to the publisher.
//! - Handlers run outside the registry lock, so they may subscribe or
//!   unsubscribe while being called.

use crate::event::todo_event::{TodoEvent, TodoEventKind};
use log::warn;
use std::collections::BTreeMap;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

type Handler = Arc<dyn Fn(&TodoEvent) -> HandlerResult + Send + Sync>;

/// Handle returned by subscribe-style APIs.
///
/// Dropping the handle keeps the registration alive; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to remove.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// One handler failure observed during publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler_id: u64,
    pub message: String,
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers invoked, failed ones included.
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    /// `true` when every handler succeeded.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct HandlerTable {
    next_id: u64,
    handlers: BTreeMap<TodoEventKind, Vec<(u64, Handler)>>,
}

/// Cloneable handle to one shared handler registry.
#[derive(Clone, Default)]
pub struct EventBus {
    table: Arc<Mutex<HandlerTable>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`.
    pub fn subscribe<F>(&self, kind: TodoEventKind, handler: F) -> Subscription
    where
        F: Fn(&TodoEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let id = {
            let mut table = lock_table(&self.table);
            table.next_id += 1;
            let id = table.next_id;
            table
                .handlers
                .entry(kind)
                .or_default()
                .push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<Mutex<HandlerTable>> = Arc::downgrade(&self.table);
        Subscription::new(move || {
            if let Some(table) = weak.upgrade() {
                let mut table = lock_table(&table);
                if let Some(handlers) = table.handlers.get_mut(&kind) {
                    handlers.retain(|(handler_id, _)| *handler_id != id);
                }
            }
        })
    }

    /// Invokes every handler registered for the event's kind.
    pub fn publish(&self, event: &TodoEvent) -> PublishReport {
        let kind = event.kind();
        let handlers: Vec<(u64, Handler)> = {
            let table = lock_table(&self.table);
            table.handlers.get(&kind).cloned().unwrap_or_default()
        };

        let mut report = PublishReport::default();
        for (handler_id, handler) in handlers {
            report.delivered += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (handler.as_ref())(event)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(_) => "handler panicked".to_string(),
            };
            warn!(
                "event=event_handler module=event status=error kind={} handler_id={} todo_id={} error={}",
                kind.as_str(),
                handler_id,
                event.todo_id,
                message
            );
            report.failures.push(HandlerFailure {
                handler_id,
                message,
            });
        }
        report
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: TodoEventKind) -> usize {
        lock_table(&self.table)
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Removes every registration.
    pub fn clear(&self) {
        lock_table(&self.table).handlers.clear();
    }
}

// Handlers never run under this lock, so a poisoned table is still consistent.
fn lock_table(table: &Mutex<HandlerTable>) -> MutexGuard<'_, HandlerTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::value::TodoId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_handler(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(&TodoEvent) -> HandlerResult + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn publish_reaches_only_matching_kind() {
        let bus = EventBus::new();
        let updated = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let _a = bus.subscribe(TodoEventKind::Updated, counter_handler(&updated));
        let _b = bus.subscribe(TodoEventKind::Deleted, counter_handler(&deleted));

        let report = bus.publish(&TodoEvent::updated(TodoId::generate()));
        assert_eq!(report.delivered, 1);
        assert!(report.is_ok());
        assert_eq!(updated.load(Ordering::SeqCst), 1);
        assert_eq!(deleted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let subscription = bus.subscribe(TodoEventKind::Updated, counter_handler(&hits));
        assert_eq!(bus.handler_count(TodoEventKind::Updated), 1);

        subscription.unsubscribe();
        assert_eq!(bus.handler_count(TodoEventKind::Updated), 0);

        bus.publish(&TodoEvent::updated(TodoId::generate()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_handlers_are_isolated_and_reported() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _failing = bus.subscribe(TodoEventKind::Deleted, |_| Err("boom".into()));
        let _panicking = bus.subscribe(TodoEventKind::Deleted, |_| panic!("handler bug"));
        let _ok = bus.subscribe(TodoEventKind::Deleted, counter_handler(&hits));

        let report = bus.publish(&TodoEvent::deleted(TodoId::generate()));
        assert_eq!(report.delivered, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].message, "boom");
        assert_eq!(report.failures[1].message, "handler panicked");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_publish() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let handler_slot = Arc::clone(&slot);
        let handler_hits = Arc::clone(&hits);
        let subscription = bus.subscribe(TodoEventKind::Created, move |_| {
            handler_hits.fetch_add(1, Ordering::SeqCst);
            if let Some(subscription) = handler_slot.lock().unwrap().take() {
                subscription.unsubscribe();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(subscription);

        bus.publish(&TodoEvent::created(TodoId::generate()));
        bus.publish(&TodoEvent::created(TodoId::generate()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_drops_all_handlers() {
        let bus = EventBus::new();
        let _a = bus.subscribe(TodoEventKind::Updated, |_| Ok(()));
        let _b = bus.subscribe(TodoEventKind::Created, |_| Ok(()));
        bus.clear();
        for kind in TodoEventKind::ALL {
            assert_eq!(bus.handler_count(kind), 0);
        }
    }
}

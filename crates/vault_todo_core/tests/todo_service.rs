use chrono::{Duration, TimeZone, Utc};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;
use vault_todo_core::{
    FileTodoStore, MemoryTodoStore, Priority, SortKey, StorageError, TodoDraft, TodoEventKind,
    TodoItem, TodoService, TodoServiceError, TodoSettings, TodoStatus, TodoStore, UpdateNotice,
};

fn memory_service() -> (TodoService<MemoryTodoStore>, MemoryTodoStore) {
    let store = MemoryTodoStore::new("Todos/todos.md");
    let service = TodoService::new(store.clone(), TodoSettings::default());
    service.initialize().unwrap();
    (service, store)
}

#[test]
fn created_record_survives_reload_from_disk() {
    let vault = TempDir::new().unwrap();
    let settings = TodoSettings::default();
    {
        let store = FileTodoStore::new(vault.path(), &settings.data_file).unwrap();
        let service = TodoService::new(store, settings.clone());
        service.initialize().unwrap();
        service.add_todo(TodoDraft::titled("Buy milk")).unwrap();
    }

    let store = FileTodoStore::new(vault.path(), &settings.data_file).unwrap();
    let service = TodoService::new(store, settings);
    service.initialize().unwrap();
    let todos = service.get_all_todos().unwrap();

    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].title().as_str(), "Buy milk");
    assert_eq!(todos[0].status(), TodoStatus::Active);
    assert!(todos[0].tags().is_empty());
    assert_eq!(todos[0].priority(), Priority::Medium);
}

#[test]
fn toggling_twice_restores_status_with_increasing_updated() {
    let (service, _) = memory_service();
    let todo = service.add_todo(TodoDraft::titled("stretch")).unwrap();

    let done = service.toggle_complete(todo.id()).unwrap();
    let reopened = service.toggle_complete(todo.id()).unwrap();

    assert_eq!(done.status(), TodoStatus::Completed);
    assert_eq!(reopened.status(), TodoStatus::Active);
    assert!(done.timestamps().updated > todo.timestamps().updated);
    assert!(reopened.timestamps().updated > done.timestamps().updated);
    assert_eq!(reopened.dates().completed(), None);
}

#[test]
fn clear_completed_removes_only_completed() {
    let (service, store) = memory_service();
    for index in 0..5 {
        let todo = service
            .add_todo(TodoDraft::titled(format!("task {index}")))
            .unwrap();
        if index < 3 {
            service.toggle_complete(todo.id()).unwrap();
        }
    }

    assert_eq!(service.clear_completed().unwrap(), 3);
    assert_eq!(service.get_all_todos().unwrap().len(), 2);
    assert_eq!(store.read_all().unwrap().todos.len(), 2);
    assert_eq!(service.clear_completed().unwrap(), 0);
}

#[test]
fn due_date_sort_is_stable_with_missing_dates_last() {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let due = |day: u32| Some(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap());
    let make = |title: &str, due| {
        let mut draft = TodoDraft::titled(title);
        draft.due = due;
        TodoItem::create_at(draft, created).unwrap()
    };
    let todos = vec![
        make("undated first", None),
        make("late", due(20)),
        make("early a", due(5)),
        make("undated second", None),
        make("early b", due(5)),
    ];

    let sorted = TodoService::<MemoryTodoStore>::sort_todos(todos, SortKey::DueDate);
    let titles: Vec<&str> = sorted.iter().map(|t| t.title().as_str()).collect();
    assert_eq!(
        titles,
        vec!["early a", "early b", "late", "undated first", "undated second"]
    );
}

#[test]
fn overdue_excludes_completed_and_future() {
    let (service, _) = memory_service();
    let yesterday = Utc::now() - Duration::days(1);
    let tomorrow = Utc::now() + Duration::days(1);

    let mut late = TodoDraft::titled("late");
    late.due = Some(yesterday);
    let late = service.add_todo(late).unwrap();

    let mut late_done = TodoDraft::titled("late but done");
    late_done.due = Some(yesterday);
    let late_done = service.add_todo(late_done).unwrap();
    service.toggle_complete(late_done.id()).unwrap();

    let mut upcoming = TodoDraft::titled("upcoming");
    upcoming.due = Some(tomorrow);
    service.add_todo(upcoming).unwrap();
    service.add_todo(TodoDraft::titled("undated")).unwrap();

    let overdue = service.get_overdue_todos().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id(), late.id());
    assert_eq!(service.get_statistics().unwrap().overdue, 1);
}

#[test]
fn failed_write_leaves_service_state_unchanged() {
    let (service, store) = memory_service();
    let kept = service.add_todo(TodoDraft::titled("kept")).unwrap();
    service.flush_notifications();

    store.set_fail_writes(true);
    let err = service.add_todo(TodoDraft::titled("lost")).unwrap_err();
    assert!(matches!(
        err,
        TodoServiceError::Storage(StorageError::Unavailable(_))
    ));
    assert!(service.toggle_complete(kept.id()).is_err());

    let todos = service.get_all_todos().unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].status(), TodoStatus::Active);
    assert_eq!(service.pending_notifications(), 0);
}

#[test]
fn notifications_are_deferred_until_flush() {
    let (service, _) = memory_service();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();

    let listener_log = Arc::clone(&seen);
    let _listener = service.on_update(move |notice| {
        let label = match notice {
            UpdateNotice::Mutation { events, .. } => events[0].kind().as_str().to_string(),
            UpdateNotice::ClearedCompleted { removed } => format!("cleared {}", removed.len()),
            UpdateNotice::Reloaded => "reloaded".to_string(),
        };
        listener_log.lock().unwrap().push(label);
    });
    let bus_log = Arc::clone(&seen);
    let _created = service.events().subscribe(TodoEventKind::Created, move |_| {
        bus_log.lock().unwrap().push("bus created".to_string());
        Ok(())
    });

    let todo = service.add_todo(TodoDraft::titled("deferred")).unwrap();
    service.toggle_complete(todo.id()).unwrap();
    service.clear_completed().unwrap();
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(service.pending_notifications(), 3);

    assert_eq!(service.flush_notifications(), 3);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "bus created",
            "todo_created",
            "todo_status_toggled",
            "cleared 1"
        ]
    );
    assert_eq!(service.flush_notifications(), 0);
}

#[test]
fn listener_may_call_back_into_service() {
    let (service, _) = memory_service();
    let service = Arc::new(service);
    let counts: Arc<Mutex<Vec<usize>>> = Arc::default();

    let weak = Arc::downgrade(&service);
    let seen = Arc::clone(&counts);
    let _listener = service.on_update(move |_| {
        if let Some(service) = weak.upgrade() {
            seen.lock()
                .unwrap()
                .push(service.get_all_todos().unwrap().len());
        }
    });

    service.add_todo(TodoDraft::titled("one")).unwrap();
    service.add_todo(TodoDraft::titled("two")).unwrap();
    service.flush_notifications();
    assert_eq!(*counts.lock().unwrap(), vec![2, 2]);
}

#[test]
fn panicking_listener_does_not_block_others() {
    let (service, _) = memory_service();
    let hits: Arc<Mutex<usize>> = Arc::default();
    let _bad = service.on_update(|_| panic!("listener bug"));
    let counter = Arc::clone(&hits);
    let _good = service.on_update(move |_| *counter.lock().unwrap() += 1);

    service.add_todo(TodoDraft::titled("robust")).unwrap();
    service.flush_notifications();
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn external_edits_are_picked_up_when_auto_refresh_is_on() {
    let vault = TempDir::new().unwrap();
    let store = FileTodoStore::new(vault.path(), "todos.md").unwrap();
    let service = TodoService::new(store, TodoSettings::default());
    service.initialize().unwrap();
    service.add_todo(TodoDraft::titled("local")).unwrap();
    service.flush_notifications();

    std::fs::write(
        vault.path().join("todos.md"),
        "title: from phone\n---\ntitle: from laptop\n",
    )
    .unwrap();

    assert!(service.sync_external_changes().unwrap());
    let titles: Vec<String> = service
        .get_all_todos()
        .unwrap()
        .iter()
        .map(|t| t.title().to_string())
        .collect();
    assert_eq!(titles, vec!["from phone", "from laptop"]);
    assert_eq!(service.flush_notifications(), 1);

    service.set_settings(TodoSettings {
        auto_refresh: false,
        ..TodoSettings::default()
    });
    std::fs::write(vault.path().join("todos.md"), "title: ignored\n").unwrap();
    assert!(!service.sync_external_changes().unwrap());
}

#[test]
fn tasks_line_input_creates_structured_record() {
    let (service, _) = memory_service();
    let todo = service
        .add_todo_from_tasks_line("Submit report 🔺 📅 2024-09-30 #work")
        .unwrap();

    assert_eq!(todo.priority(), Priority::Highest);
    assert_eq!(
        todo.dates().due(),
        Some(Utc.with_ymd_and_hms(2024, 9, 30, 0, 0, 0).unwrap())
    );
    assert!(todo.has_tag("work"));
    assert_eq!(service.get_all_tags().unwrap(), vec!["work"]);
}

#[test]
fn bus_handlers_may_read_the_service() {
    let (service, _) = memory_service();
    let service = Arc::new(service);
    let seen: Arc<Mutex<Vec<usize>>> = Arc::default();

    let weak = Arc::downgrade(&service);
    let counts = Arc::clone(&seen);
    let _updated = service
        .events()
        .subscribe(TodoEventKind::Updated, move |_| {
            if let Some(service) = weak.upgrade() {
                let total = service.get_all_todos().map_err(|err| err.to_string())?;
                counts.lock().unwrap().push(total.len());
            }
            Ok(())
        });

    let (done_tx, done_rx) = mpsc::channel();
    let worker_service = Arc::clone(&service);
    let worker = thread::spawn(move || {
        let outcome = worker_service
            .add_todo(TodoDraft::titled("a"))
            .and_then(|todo| worker_service.toggle_complete(todo.id()));
        let _ = done_tx.send(outcome.is_ok());
    });

    let finished = done_rx.recv_timeout(std::time::Duration::from_secs(5));
    assert_eq!(finished, Ok(true), "mutation blocked by its own handler");
    worker.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1, 1]);
}

#[test]
fn concurrent_adds_are_all_persisted() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 5;

    let vault = TempDir::new().unwrap();
    let store = FileTodoStore::new(vault.path(), "todos.md").unwrap();
    let service = Arc::new(TodoService::new(store, TodoSettings::default()));
    service.initialize().unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for index in 0..PER_THREAD {
                    service
                        .add_todo(TodoDraft::titled(format!("worker {worker} item {index}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(service.get_all_todos().unwrap().len(), THREADS * PER_THREAD);
    assert_eq!(service.flush_notifications(), THREADS * PER_THREAD);

    let mut reopened = FileTodoStore::new(vault.path(), "todos.md").unwrap();
    reopened.initialize().unwrap();
    let decoded = reopened.read_all().unwrap();
    assert!(decoded.warnings.is_empty());
    assert_eq!(decoded.todos.len(), THREADS * PER_THREAD);
}

#[test]
fn finished_tasks_line_imports_as_completed() {
    let (service, _) = memory_service();
    let todo = service
        .add_todo_from_tasks_line("- [x] Review ✅ 2024-01-01")
        .unwrap();

    assert_eq!(todo.title().as_str(), "Review");
    assert_eq!(todo.status(), TodoStatus::Completed);
    assert_eq!(
        todo.dates().completed(),
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(service.get_completed_todos().unwrap().len(), 1);
}

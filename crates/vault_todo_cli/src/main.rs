//! Command-line front end for a vault's to-do document.
//!
//! # Responsibility
//! - Wire settings, logging, the file store and the service together.
//! - Map subcommands onto service calls and print plain-text results.
//!
//! Every mutating command flushes queued update notices before exiting.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use vault_todo_core::model::dates::parse_instant;
use vault_todo_core::{
    init_logging, parse_tasks_line, resolve_log_level, FileTodoStore, Priority, SortKey,
    TodoFilter, TodoId, TodoItem, TodoService, TodoSettings, UpdateNotice, ViewMode,
};

const APP_DIR: &str = ".vault-todo";

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage the to-do document of a notes vault")]
struct Cli {
    /// Vault root directory
    #[arg(long, default_value = ".")]
    vault: PathBuf,

    /// Vault-relative document path (overrides settings)
    #[arg(long)]
    file: Option<String>,

    /// Settings JSON file (default: <vault>/.vault-todo/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Add a to-do. Tasks-plugin markers in the title are parsed.
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long, short)]
        priority: Option<Priority>,
        /// Due date, `YYYY-MM-DD` or RFC 3339
        #[arg(long, value_parser = parse_date)]
        due: Option<DateTime<Utc>>,
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Vault-relative note this to-do refers to
        #[arg(long)]
        note: Option<String>,
    },
    /// List to-dos using the configured view, or a filter when one is given.
    List {
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        overdue: bool,
        /// dueDate | priority | createdAt | title
        #[arg(long)]
        sort: Option<SortKey>,
    },
    /// Toggle completion of a to-do (id or unique id prefix).
    Done { id: String },
    /// Cancel a to-do. Cancellation is final.
    Cancel { id: String },
    /// Delete a to-do.
    Delete { id: String },
    /// Remove all completed to-dos.
    Clear,
    /// Show counts and completion rate.
    Stats,
    /// List all tags.
    Tags,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ViewArg {
    All,
    Active,
    Completed,
    Cancelled,
}

impl From<ViewArg> for ViewMode {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::All => ViewMode::All,
            ViewArg::Active => ViewMode::Active,
            ViewArg::Completed => ViewMode::Completed,
            ViewArg::Cancelled => ViewMode::Cancelled,
        }
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(value)
        .ok_or_else(|| format!("`{value}` is not a YYYY-MM-DD date or RFC 3339 instant"))
}

fn main() -> anyhow::Result<()> {
    run(Cli::parse())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let vault = cli
        .vault
        .canonicalize()
        .with_context(|| format!("vault directory `{}` not found", cli.vault.display()))?;
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| vault.join(APP_DIR).join("settings.json"));
    let mut settings = TodoSettings::load(&settings_path)
        .with_context(|| format!("failed to load settings from `{}`", settings_path.display()))?;
    if let Some(file) = &cli.file {
        settings.data_file = file.clone();
    }

    start_logging(&vault, &settings);

    let store = FileTodoStore::new(vault.clone(), &settings.data_file)?;
    let service = TodoService::new(store, settings);
    service.initialize()?;
    for warning in service.last_warnings()? {
        eprintln!("warning: {warning}");
    }
    let _listener = service.on_update(|notice| match notice {
        UpdateNotice::Mutation { todo_id, events } => {
            debug!(
                "event=cli_notice module=cli kind=mutation id={} events={}",
                todo_id,
                events.len()
            );
        }
        UpdateNotice::ClearedCompleted { removed } => {
            debug!(
                "event=cli_notice module=cli kind=cleared count={}",
                removed.len()
            );
        }
        UpdateNotice::Reloaded => debug!("event=cli_notice module=cli kind=reloaded"),
    });

    execute(&service, cli.cmd)?;
    service.flush_notifications();
    Ok(())
}

fn start_logging(vault: &Path, settings: &TodoSettings) {
    let log_dir = vault.join(APP_DIR).join("logs");
    let level = resolve_log_level(settings.log_level.as_deref());
    if let Err(err) = init_logging(level, &log_dir.to_string_lossy()) {
        eprintln!("warning: file logging disabled: {err}");
    }
}

fn execute(service: &TodoService<FileTodoStore>, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Add {
            title,
            priority,
            due,
            tags,
            description,
            note,
        } => {
            let mut draft = parse_tasks_line(&title.join(" ")).to_draft();
            draft.priority = priority.or(draft.priority);
            draft.due = due.or(draft.due);
            draft.tags.extend(tags);
            draft.description = description;
            draft.linked_note = note;
            let todo = service.add_todo(draft)?;
            println!("added {}", render(&todo));
        }
        Command::List {
            view,
            tag,
            search,
            priority,
            overdue,
            sort,
        } => {
            let filtered = view.is_some()
                || tag.is_some()
                || search.is_some()
                || priority.is_some()
                || overdue;
            let todos = if filtered {
                let filter = TodoFilter {
                    view: view.map(ViewMode::from).unwrap_or_default(),
                    tag,
                    search,
                    priority,
                    overdue_only: overdue,
                };
                let sort = sort.unwrap_or(service.settings().sort_by);
                TodoService::<FileTodoStore>::sort_todos(service.filter_todos(&filter)?, sort)
            } else {
                let visible = service.visible_todos()?;
                match sort {
                    Some(key) => TodoService::<FileTodoStore>::sort_todos(visible, key),
                    None => visible,
                }
            };
            if todos.is_empty() {
                println!("no to-dos");
            }
            for todo in &todos {
                println!("{}", render(todo));
            }
        }
        Command::Done { id } => {
            let id = resolve_id(service, &id)?;
            let todo = service.toggle_complete(&id)?;
            println!("{}", render(&todo));
        }
        Command::Cancel { id } => {
            let id = resolve_id(service, &id)?;
            let todo = service.cancel_todo(&id)?;
            println!("{}", render(&todo));
        }
        Command::Delete { id } => {
            let id = resolve_id(service, &id)?;
            service.delete_todo(&id)?;
            println!("deleted {id}");
        }
        Command::Clear => {
            let removed = service.clear_completed()?;
            println!("removed {removed} completed to-do(s)");
        }
        Command::Stats => {
            let stats = service.get_statistics()?;
            println!(
                "total {}  active {}  completed {}  cancelled {}  overdue {}  done {}%",
                stats.total,
                stats.active,
                stats.completed,
                stats.cancelled,
                stats.overdue,
                stats.completion_rate
            );
        }
        Command::Tags => {
            for tag in service.get_all_tags()? {
                println!("#{tag}");
            }
        }
    }
    Ok(())
}

/// Accepts a full id or a prefix matching exactly one record.
fn resolve_id(service: &TodoService<FileTodoStore>, input: &str) -> anyhow::Result<TodoId> {
    let input = input.trim();
    let matches: Vec<TodoId> = service
        .get_all_todos()?
        .into_iter()
        .map(|todo| todo.id().clone())
        .filter(|id| id.as_str().starts_with(input))
        .collect();
    if let Some(exact) = matches.iter().find(|id| id.as_str() == input) {
        return Ok(exact.clone());
    }
    match matches.as_slice() {
        [only] => Ok(only.clone()),
        [] => bail!("no to-do with id `{input}`"),
        _ => {
            warn!(
                "event=cli_resolve module=cli status=error reason=ambiguous_prefix matches={}",
                matches.len()
            );
            bail!("id prefix `{input}` matches {} to-dos", matches.len())
        }
    }
}

fn render(todo: &TodoItem) -> String {
    let marker = if todo.is_completed() {
        "[x]"
    } else if todo.is_cancelled() {
        "[-]"
    } else {
        "[ ]"
    };
    let short_id: String = todo.id().as_str().chars().take(8).collect();
    let mut line = format!("{marker} {short_id}  {} ({})", todo.title(), todo.priority());
    if let Some(due) = todo.dates().due() {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
        if todo.is_overdue() {
            line.push_str(" OVERDUE");
        }
    }
    for tag in todo.tags().iter() {
        line.push_str(&format!(" #{tag}"));
    }
    line
}

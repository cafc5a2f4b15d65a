//! Text document codec for the persisted to-do file.
//!
//! # Responsibility
//! - Serialize the record list into a header block plus one `key: value`
//!   block per record, joined by `---` separator lines.
//! - Parse such documents back, tolerating damaged blocks.
//!
//! # Invariants
//! - One malformed block never aborts parsing of the rest of the document.
//! - Free-text values are escaped so a value can never produce a separator
//!   line or an extra key.
//! - Every recovered problem is logged and returned as a `ParseWarning`.
//!
//! # See also
//! - `crate::model::value` for the validation each field goes through.

use crate::model::dates::{format_instant, now_millis, parse_instant, TodoDates};
use crate::model::todo::{TodoItem, TodoParts};
use crate::model::value::{
    Description, NotePath, Priority, Title, TodoId, TodoStatus, TodoTags, ValidationError,
};
use chrono::{DateTime, Utc};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Title written into the document header block.
pub const DOCUMENT_TITLE: &str = "Todos";

const BLOCK_SEPARATOR: &str = "\n---\n";

static BLOCK_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n---\r?\n").expect("valid block separator regex"));

const KEY_ID: &str = "id";
const KEY_TITLE: &str = "title";
const KEY_DESCRIPTION: &str = "description";
const KEY_PRIORITY: &str = "priority";
const KEY_DUE: &str = "dueDate";
const KEY_SCHEDULED: &str = "scheduledDate";
const KEY_START: &str = "startDate";
const KEY_CREATED: &str = "createdAt";
const KEY_COMPLETED: &str = "completedAt";
const KEY_CANCELLED: &str = "cancelledAt";
const KEY_TAGS: &str = "tags";
const KEY_STATUS: &str = "status";
const KEY_LINKED_NOTE: &str = "linkedNote";
const KEY_UPDATED: &str = "updatedAt";
/// Boolean flag written by older plugin versions instead of `status`.
const KEY_LEGACY_COMPLETED: &str = "completed";

/// What went wrong in one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarningKind {
    /// Block has no `title` key; it was skipped.
    MissingTitle,
    /// A field failed validation; the block was skipped.
    RejectedBlock(ValidationError),
    /// Unknown priority literal; `medium` was used.
    UnknownPriority(String),
    /// Unknown status literal; `active` was used.
    UnknownStatus(String),
    /// Unparseable date; optional dates were dropped, required ones replaced
    /// by the parse instant.
    InvalidDate { key: &'static str, value: String },
    /// A tag that cannot be stored was dropped.
    InvalidTag(String),
}

/// A recovered per-block parse problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Zero-based index of the block among the document's record blocks.
    pub block_index: usize,
    pub kind: ParseWarningKind,
}

impl Display for ParseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {}: ", self.block_index)?;
        match &self.kind {
            ParseWarningKind::MissingTitle => write!(f, "missing title, block skipped"),
            ParseWarningKind::RejectedBlock(err) => write!(f, "{err}, block skipped"),
            ParseWarningKind::UnknownPriority(value) => {
                write!(f, "unknown priority `{value}`, using medium")
            }
            ParseWarningKind::UnknownStatus(value) => {
                write!(f, "unknown status `{value}`, using active")
            }
            ParseWarningKind::InvalidDate { key, value } => {
                write!(f, "invalid date `{value}` for `{key}`")
            }
            ParseWarningKind::InvalidTag(tag) => write!(f, "invalid tag `{tag}` dropped"),
        }
    }
}

/// Parsed records plus every recovered problem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedDocument {
    pub todos: Vec<TodoItem>,
    pub warnings: Vec<ParseWarning>,
}

/// Serializes `todos` into one document stamped with `generated_at`.
pub fn serialize_document(todos: &[TodoItem], generated_at: DateTime<Utc>) -> String {
    let header = format!(
        "---\n{KEY_TITLE}: {DOCUMENT_TITLE}\ncreated: {}\n---\n\n",
        format_instant(&generated_at)
    );
    let blocks: Vec<String> = todos.iter().map(serialize_block).collect();
    header + &blocks.join(BLOCK_SEPARATOR)
}

/// Serializes one record as `key: value` lines.
pub fn serialize_block(todo: &TodoItem) -> String {
    let mut lines = Vec::with_capacity(14);
    lines.push(format!("{KEY_ID}: {}", escape_scalar(todo.id().as_str())));
    lines.push(format!(
        "{KEY_TITLE}: {}",
        escape_scalar(todo.title().as_str())
    ));
    if let Some(description) = todo.description() {
        lines.push(format!(
            "{KEY_DESCRIPTION}: {}",
            escape_scalar(description.as_str())
        ));
    }
    lines.push(format!("{KEY_PRIORITY}: {}", todo.priority()));

    let dates = todo.dates();
    push_date(&mut lines, KEY_DUE, dates.due());
    push_date(&mut lines, KEY_SCHEDULED, dates.scheduled());
    push_date(&mut lines, KEY_START, dates.start());
    push_date(&mut lines, KEY_CREATED, Some(dates.created()));
    push_date(&mut lines, KEY_COMPLETED, dates.completed());
    push_date(&mut lines, KEY_CANCELLED, dates.cancelled());

    if !todo.tags().is_empty() {
        let quoted: Vec<String> = todo.tags().iter().map(|tag| format!("'{tag}'")).collect();
        lines.push(format!("{KEY_TAGS}: [{}]", quoted.join(", ")));
    }
    lines.push(format!("{KEY_STATUS}: {}", todo.status()));
    if let Some(note) = todo.linked_note() {
        lines.push(format!(
            "{KEY_LINKED_NOTE}: {}",
            escape_scalar(note.as_str())
        ));
    }
    push_date(&mut lines, KEY_UPDATED, Some(todo.timestamps().updated));

    lines.join("\n")
}

fn push_date(lines: &mut Vec<String>, key: &str, value: Option<DateTime<Utc>>) {
    if let Some(instant) = value {
        lines.push(format!("{key}: {}", format_instant(&instant)));
    }
}

/// Parses a document. Never fails; problems end up in `warnings`.
pub fn deserialize_document(content: &str) -> DecodedDocument {
    let parsed_at = now_millis();
    let content = content.trim_start_matches('\u{feff}');
    let mut segments = BLOCK_SEPARATOR_RE.split(content).peekable();

    // A leading `---` line opens the header block, which is never a record.
    if content.trim_start().starts_with("---") {
        segments.next();
    }

    let mut decoded = DecodedDocument::default();
    let mut block_index = 0;
    for segment in segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut warnings = Vec::new();
        if let Some(todo) = parse_block(trimmed, block_index, parsed_at, &mut warnings) {
            decoded.todos.push(todo);
        }
        for warning in &warnings {
            warn!(
                "event=todo_parse module=codec status=warning block={} reason={}",
                warning.block_index, warning
            );
        }
        decoded.warnings.extend(warnings);
        block_index += 1;
    }
    decoded
}

/// Value shape after type coercion, before value-object construction.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawValue {
    Text(String),
    Bool(bool),
    List(Vec<String>),
}

impl RawValue {
    /// Only `tags` holds list syntax; brackets in any other value are text.
    fn coerce(key: &str, value: &str) -> Self {
        match value {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ if key == KEY_TAGS
                && value.len() >= 2
                && value.starts_with('[')
                && value.ends_with(']') =>
            {
                Self::List(parse_list_items(&value[1..value.len() - 1]))
            }
            _ => Self::Text(unescape_scalar(value)),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Bool(flag) => flag.to_string(),
            Self::List(items) => items.join(", "),
        }
    }
}

fn parse_list_items(inner: &str) -> Vec<String> {
    inner
        .split(',')
        .map(|item| {
            item.trim()
                .trim_start_matches(['\'', '"'])
                .trim_end_matches(['\'', '"'])
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_fields(block: &str) -> HashMap<String, RawValue> {
    let mut fields = HashMap::new();
    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        // Last occurrence of a key wins.
        fields.insert(key.to_string(), RawValue::coerce(key, value.trim()));
    }
    fields
}

fn parse_block(
    block: &str,
    block_index: usize,
    parsed_at: DateTime<Utc>,
    warnings: &mut Vec<ParseWarning>,
) -> Option<TodoItem> {
    let fields = parse_fields(block);
    let mut warn_with = |kind: ParseWarningKind| warnings.push(ParseWarning { block_index, kind });

    let Some(title) = fields.get(KEY_TITLE) else {
        warn_with(ParseWarningKind::MissingTitle);
        return None;
    };

    let validated = (|| -> Result<_, ValidationError> {
        let title = Title::new(&title.as_text())?;
        let id = match fields.get(KEY_ID).map(RawValue::as_text) {
            Some(text) if !text.trim().is_empty() => TodoId::parse(text)?,
            _ => TodoId::generate(),
        };
        let description = match fields.get(KEY_DESCRIPTION) {
            Some(value) => Description::optional(&value.as_text())?,
            None => None,
        };
        Ok((id, title, description))
    })();
    let (id, title, description) = match validated {
        Ok(parts) => parts,
        Err(err) => {
            warn_with(ParseWarningKind::RejectedBlock(err));
            return None;
        }
    };

    let priority = match fields.get(KEY_PRIORITY).map(RawValue::as_text) {
        Some(text) => Priority::parse_strict(&text).unwrap_or_else(|_| {
            warn_with(ParseWarningKind::UnknownPriority(text.clone()));
            Priority::from_str_lossy(&text)
        }),
        None => Priority::default(),
    };

    let status = match fields.get(KEY_STATUS).map(RawValue::as_text) {
        Some(text) => TodoStatus::parse_strict(&text).unwrap_or_else(|_| {
            warn_with(ParseWarningKind::UnknownStatus(text.clone()));
            TodoStatus::from_str_lossy(&text)
        }),
        None => match fields.get(KEY_LEGACY_COMPLETED) {
            Some(RawValue::Bool(true)) => TodoStatus::Completed,
            _ => TodoStatus::Active,
        },
    };

    let mut optional_date = |key: &'static str| -> Option<DateTime<Utc>> {
        let text = fields.get(key)?.as_text();
        let parsed = parse_instant(&text);
        if parsed.is_none() {
            warn_with(ParseWarningKind::InvalidDate { key, value: text });
        }
        parsed
    };
    let due = optional_date(KEY_DUE);
    let scheduled = optional_date(KEY_SCHEDULED);
    let start = optional_date(KEY_START);
    let completed = optional_date(KEY_COMPLETED);
    let cancelled = optional_date(KEY_CANCELLED);
    let created_field = optional_date(KEY_CREATED);
    let updated_field = optional_date(KEY_UPDATED);

    // Missing required instants default quietly; invalid ones were warned above.
    let created = created_field.unwrap_or(parsed_at);
    let updated = match (updated_field, fields.contains_key(KEY_UPDATED)) {
        (Some(updated), _) => updated,
        (None, true) => parsed_at,
        (None, false) => created,
    };

    let raw_tags = match fields.get(KEY_TAGS) {
        Some(RawValue::List(items)) => items.clone(),
        Some(RawValue::Text(text)) => text.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    let mut tags = TodoTags::empty();
    for tag in raw_tags {
        match tags.add(&tag) {
            Ok(next) => tags = next,
            Err(_) => warn_with(ParseWarningKind::InvalidTag(tag)),
        }
    }

    let linked_note = fields
        .get(KEY_LINKED_NOTE)
        .and_then(|value| NotePath::optional(&value.as_text()));

    let dates = TodoDates::with_created(created)
        .with_due(due)
        .with_scheduled(scheduled)
        .with_start(start)
        .with_completed(completed)
        .with_cancelled(cancelled);

    Some(TodoItem::from_parts(TodoParts {
        id,
        title,
        description,
        priority,
        dates,
        tags,
        status,
        linked_note,
        updated,
    }))
}

/// Escapes `\`, `:`, line feed and carriage return.
pub fn escape_scalar(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            ':' => escaped.push_str("\\:"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverses [`escape_scalar`]. Unknown escapes are kept verbatim.
pub fn unescape_scalar(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            unescaped.push(ch);
            continue;
        }
        match chars.peek() {
            Some(':') => unescaped.push(':'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('\\') => unescaped.push('\\'),
            _ => {
                unescaped.push('\\');
                continue;
            }
        }
        chars.next();
    }
    unescaped
}

//! Parser for single task lines written in the Tasks-plugin emoji format,
//! e.g. `- [ ] Pay rent ⏫ 📅 2024-07-01 🔁 every month #home`.
//!
//! Markers are removed from the returned text; `#tags` stay in it and are
//! also collected. Recurrence rules are parsed but records have no field for
//! them, so drafts drop them.

use crate::model::dates::parse_instant;
use crate::model::todo::TodoDraft;
use crate::model::value::{Priority, TodoStatus};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static CHECKBOX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+\[(.)\]\s*").expect("valid checkbox regex"));
static PRIORITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([🔺⏫🔼🔽⏬])\x{FE0F}?").expect("valid priority regex"));
static DUE_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("[📅📆🗓]"));
static SCHEDULED_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("[⏳⌛]"));
static START_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("🛫"));
static CREATED_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("➕"));
static DONE_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("✅"));
static CANCELLED_RE: Lazy<Regex> = Lazy::new(|| date_marker_regex("❌"));
static RECURRENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"🔁\x{FE0F}?\s*([a-zA-Z0-9, !]+)").expect("valid recurrence regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([^\s#]+)").expect("valid tag regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid spaces regex"));

fn date_marker_regex(marker: &str) -> Regex {
    Regex::new(&format!(r"{marker}\x{{FE0F}}?\s*(\d{{4}}-\d{{2}}-\d{{2}})"))
        .expect("valid date marker regex")
}

/// Fields recovered from one task line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasksLine {
    /// Line text with checkbox and emoji markers removed.
    pub text: String,
    /// Character inside the list checkbox, e.g. `x` for `- [x]`.
    pub checkbox: Option<char>,
    pub priority: Option<Priority>,
    pub due: Option<DateTime<Utc>>,
    pub scheduled: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub done: Option<DateTime<Utc>>,
    pub cancelled: Option<DateTime<Utc>>,
    pub recurrence: Option<String>,
    pub tags: Vec<String>,
    /// `true` when at least one emoji marker was found.
    pub has_markers: bool,
}

impl TasksLine {
    /// Status implied by the checkbox or a done/cancelled date.
    ///
    /// `[x]`/`[X]` or `✅` mean completed, `[-]` or `❌` mean cancelled.
    pub fn status(&self) -> TodoStatus {
        match self.checkbox {
            Some('x' | 'X') => TodoStatus::Completed,
            Some('-') => TodoStatus::Cancelled,
            _ if self.done.is_some() => TodoStatus::Completed,
            _ if self.cancelled.is_some() => TodoStatus::Cancelled,
            _ => TodoStatus::Active,
        }
    }

    /// Draft for a new record. Title is the cleaned text.
    pub fn to_draft(&self) -> TodoDraft {
        TodoDraft {
            title: self.text.clone(),
            priority: self.priority,
            due: self.due,
            scheduled: self.scheduled,
            start: self.start,
            tags: self.tags.clone(),
            status: self.status(),
            created: self.created,
            completed: self.done,
            cancelled: self.cancelled,
            ..TodoDraft::default()
        }
    }
}

/// Parses one line. Unrecognized content stays in `text`.
pub fn parse_tasks_line(line: &str) -> TasksLine {
    let mut parsed = TasksLine::default();
    let trimmed = line.trim();
    parsed.checkbox = CHECKBOX_RE
        .captures(trimmed)
        .and_then(|caps| caps[1].chars().next());
    let mut text = CHECKBOX_RE.replace(trimmed, "").into_owned();

    if let Some(caps) = PRIORITY_RE.captures(&text) {
        parsed.priority = Priority::from_emoji(&caps[1]);
        parsed.has_markers = true;
        text = PRIORITY_RE.replace(&text, "").into_owned();
    }

    let date_fields: [(&Lazy<Regex>, &mut Option<DateTime<Utc>>); 6] = [
        (&DUE_RE, &mut parsed.due),
        (&SCHEDULED_RE, &mut parsed.scheduled),
        (&START_RE, &mut parsed.start),
        (&CREATED_RE, &mut parsed.created),
        (&DONE_RE, &mut parsed.done),
        (&CANCELLED_RE, &mut parsed.cancelled),
    ];
    let mut found_date = false;
    for (re, slot) in date_fields {
        let Some(date) = re.captures(&text).map(|caps| caps[1].to_string()) else {
            continue;
        };
        *slot = parse_instant(&date);
        found_date = true;
        text = re.replace(&text, "").into_owned();
    }
    parsed.has_markers |= found_date;

    if let Some(caps) = RECURRENCE_RE.captures(&text) {
        parsed.recurrence = Some(caps[1].trim().to_string());
        parsed.has_markers = true;
        text = RECURRENCE_RE.replace(&text, "").into_owned();
    }

    for caps in TAG_RE.captures_iter(&text) {
        let tag = caps[1].to_string();
        if !parsed.tags.contains(&tag) {
            parsed.tags.push(tag);
        }
    }

    parsed.text = SPACES_RE.replace_all(text.trim(), " ").into_owned();
    parsed
}

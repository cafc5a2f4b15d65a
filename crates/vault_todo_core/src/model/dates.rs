//! Named-instant set attached to every to-do, plus instant helpers.
//!
//! # Invariants
//! - `created` is always present.
//! - All instants are UTC truncated to milliseconds, the precision the record
//!   codec persists.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Current instant truncated to persisted precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drops sub-millisecond digits so in-memory and persisted instants agree.
pub fn truncate_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

/// Formats an instant as `2024-05-01T09:30:00.000Z`.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 instant or a plain `YYYY-MM-DD` date (midnight UTC).
///
/// Returns `None` for anything else; callers decide how to report it.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc).trunc_subsecs(3));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Kinds of named instants a to-do can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    Due,
    Scheduled,
    Start,
    Created,
    Completed,
    Cancelled,
}

/// Sparse set of named instants, each held at millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDates {
    created: DateTime<Utc>,
    due: Option<DateTime<Utc>>,
    scheduled: Option<DateTime<Utc>>,
    start: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    cancelled: Option<DateTime<Utc>>,
}

impl TodoDates {
    /// Creates a set holding only the creation instant.
    pub fn with_created(created: DateTime<Utc>) -> Self {
        Self {
            created: truncate_millis(created),
            due: None,
            scheduled: None,
            start: None,
            completed: None,
            cancelled: None,
        }
    }

    pub fn get(&self, kind: DateKind) -> Option<DateTime<Utc>> {
        match kind {
            DateKind::Due => self.due,
            DateKind::Scheduled => self.scheduled,
            DateKind::Start => self.start,
            DateKind::Created => Some(self.created),
            DateKind::Completed => self.completed,
            DateKind::Cancelled => self.cancelled,
        }
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn due(&self) -> Option<DateTime<Utc>> {
        self.due
    }

    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.scheduled
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn completed(&self) -> Option<DateTime<Utc>> {
        self.completed
    }

    pub fn cancelled(&self) -> Option<DateTime<Utc>> {
        self.cancelled
    }

    pub fn with_due(&self, due: Option<DateTime<Utc>>) -> Self {
        Self {
            due: due.map(truncate_millis),
            ..self.clone()
        }
    }

    pub fn with_scheduled(&self, scheduled: Option<DateTime<Utc>>) -> Self {
        Self {
            scheduled: scheduled.map(truncate_millis),
            ..self.clone()
        }
    }

    pub fn with_start(&self, start: Option<DateTime<Utc>>) -> Self {
        Self {
            start: start.map(truncate_millis),
            ..self.clone()
        }
    }

    pub fn with_completed(&self, completed: Option<DateTime<Utc>>) -> Self {
        Self {
            completed: completed.map(truncate_millis),
            ..self.clone()
        }
    }

    pub fn with_cancelled(&self, cancelled: Option<DateTime<Utc>>) -> Self {
        Self {
            cancelled: cancelled.map(truncate_millis),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_accepts_rfc3339_and_plain_dates() {
        let full = parse_instant("2024-05-01T09:30:00.123Z").unwrap();
        assert_eq!(format_instant(&full), "2024-05-01T09:30:00.123Z");

        let offset = parse_instant("2024-05-01T11:30:00+02:00").unwrap();
        assert_eq!(format_instant(&offset), "2024-05-01T09:30:00.000Z");

        let date = parse_instant("2024-05-01").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_instant("next tuesday"), None);
        assert_eq!(parse_instant("2024-13-45"), None);
        assert_eq!(parse_instant(""), None);
    }

    #[test]
    fn now_is_truncated_to_millis() {
        let now = now_millis();
        assert_eq!(parse_instant(&format_instant(&now)), Some(now));
    }

    #[test]
    fn with_helpers_return_new_sets() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let due = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let dates = TodoDates::with_created(created);
        let with_due = dates.with_due(Some(due));

        assert_eq!(dates.due(), None);
        assert_eq!(with_due.get(DateKind::Due), Some(due));
        assert_eq!(with_due.get(DateKind::Created), Some(created));
        assert_eq!(with_due.with_due(None), dates);
    }

    #[test]
    fn setters_truncate_to_millis() {
        let precise = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(7_654_321);
        let millis = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
            + chrono::Duration::milliseconds(7);

        let dates = TodoDates::with_created(precise)
            .with_due(Some(precise))
            .with_completed(Some(precise));
        assert_eq!(dates.created(), millis);
        assert_eq!(dates.due(), Some(millis));
        assert_eq!(dates.completed(), Some(millis));
        assert_eq!(truncate_millis(millis), millis);
    }
}

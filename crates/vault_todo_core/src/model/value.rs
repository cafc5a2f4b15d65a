//! Self-validating value objects for to-do records.
//!
//! # Responsibility
//! - Wrap each primitive field of a to-do record in a type that can only hold
//!   valid values.
//! - Provide the canonical string form used by the record codec.
//!
//! # Invariants
//! - Constructors reject invalid input with `ValidationError`.
//! - Values are immutable; "mutating" helpers return new instances.
//! - `Priority::from_str_lossy` and `TodoStatus::from_str_lossy` never fail so
//!   historical documents with unknown literals still load.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 500;
pub const DESCRIPTION_MAX_CHARS: usize = 5000;

/// Characters that would break the persisted `['a', 'b']` tag list syntax.
const TAG_FORBIDDEN_CHARS: [char; 7] = [',', '\'', '"', '[', ']', '\n', '\r'];

/// Value-object construction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyId,
    EmptyTitle,
    TitleTooLong { len: usize, max: usize },
    EmptyDescription,
    DescriptionTooLong { len: usize, max: usize },
    EmptyNotePath,
    InvalidTag(String),
    UnknownPriority(String),
    UnknownStatus(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "todo id cannot be empty"),
            Self::EmptyTitle => write!(f, "title cannot be empty"),
            Self::TitleTooLong { len, max } => {
                write!(f, "title cannot exceed {max} characters (got {len})")
            }
            Self::EmptyDescription => write!(f, "description cannot be empty"),
            Self::DescriptionTooLong { len, max } => {
                write!(f, "description cannot exceed {max} characters (got {len})")
            }
            Self::EmptyNotePath => write!(f, "note path cannot be empty"),
            Self::InvalidTag(tag) => write!(f, "invalid tag: `{tag}`"),
            Self::UnknownPriority(value) => write!(f, "unknown priority: `{value}`"),
            Self::UnknownStatus(value) => write!(f, "unknown status: `{value}`"),
        }
    }
}

impl Error for ValidationError {}

/// Stable, opaque to-do identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TodoId(String);

impl TodoId {
    /// Generates a fresh identifier (UUID v4 text).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier, e.g. one read back from storage.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TodoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TodoId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TodoId> for String {
    fn from(value: TodoId) -> Self {
        value.0
    }
}

/// Trimmed, non-empty, length-bounded title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Title(String);

impl Title {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let len = trimmed.chars().count();
        if len > TITLE_MAX_CHARS {
            return Err(ValidationError::TitleTooLong {
                len,
                max: TITLE_MAX_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Title {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Title {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Title> for String {
    fn from(value: Title) -> Self {
        value.0
    }
}

/// Optional free-text body of a to-do.
///
/// Blank input is not a valid `Description`; use [`Description::optional`] to
/// map it to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        Self::optional(value)?.ok_or(ValidationError::EmptyDescription)
    }

    /// Returns `Ok(None)` for empty or whitespace-only input.
    pub fn optional(value: &str) -> Result<Option<Self>, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let len = trimmed.chars().count();
        if len > DESCRIPTION_MAX_CHARS {
            return Err(ValidationError::DescriptionTooLong {
                len,
                max: DESCRIPTION_MAX_CHARS,
            });
        }
        Ok(Some(Self(trimmed.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Description {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Description {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Description> for String {
    fn from(value: Description) -> Self {
        value.0
    }
}

/// Vault-relative path of a note a to-do points at. Never owned by the to-do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotePath(String);

impl NotePath {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyNotePath);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns `None` for empty or whitespace-only input.
    pub fn optional(value: &str) -> Option<Self> {
        Self::new(value).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for NotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NotePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<NotePath> for String {
    fn from(value: NotePath) -> Self {
        value.0
    }
}

/// Ordinal priority. Declaration order is the sort order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Lowest,
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Highest,
    ];

    /// Case-insensitive parse that rejects unknown literals.
    pub fn parse_strict(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::Lowest),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "highest" => Ok(Self::Highest),
            _ => Err(ValidationError::UnknownPriority(value.to_string())),
        }
    }

    /// Permissive parse: unknown literals fall back to `Medium`.
    pub fn from_str_lossy(value: &str) -> Self {
        Self::parse_strict(value).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Highest => "highest",
        }
    }

    /// Maps a Tasks-plugin priority marker to a priority.
    pub fn from_emoji(symbol: &str) -> Option<Self> {
        match symbol.trim_end_matches('\u{FE0F}') {
            "🔺" => Some(Self::Highest),
            "⏫" => Some(Self::High),
            "🔼" => Some(Self::Medium),
            "🔽" => Some(Self::Low),
            "⏬" => Some(Self::Lowest),
            _ => None,
        }
    }

    /// Tasks-plugin priority marker.
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Highest => "🔺",
            Self::High => "⏫",
            Self::Medium => "🔼",
            Self::Low => "🔽",
            Self::Lowest => "⏬",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(s)
    }
}

/// Mutually exclusive lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

impl TodoStatus {
    /// Case-insensitive parse that rejects unknown literals.
    pub fn parse_strict(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ValidationError::UnknownStatus(value.to_string())),
        }
    }

    /// Permissive parse: unknown literals fall back to `Active`.
    pub fn from_str_lossy(value: &str) -> Self {
        Self::parse_strict(value).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    pub fn is_cancelled(self) -> bool {
        self == Self::Cancelled
    }
}

impl Display for TodoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_strict(s)
    }
}

/// Deduplicated, insertion-ordered, case-sensitive tag set.
///
/// Equality ignores order.
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TodoTags(Vec<String>);

impl TodoTags {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a tag set; blank entries are dropped and duplicates collapse.
    pub fn from_vec<I, T>(tags: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut set = Self::empty();
        for tag in tags {
            set = set.add(tag.as_ref())?;
        }
        Ok(set)
    }

    /// Parses comma-separated input such as `work, home`.
    pub fn parse_list(value: &str) -> Result<Self, ValidationError> {
        Self::from_vec(value.split(','))
    }

    /// Returns a set containing `tag`. Adding a present or blank tag is a no-op.
    pub fn add(&self, tag: &str) -> Result<Self, ValidationError> {
        let trimmed = tag.trim();
        if trimmed.is_empty() || self.contains(trimmed) {
            return Ok(self.clone());
        }
        if trimmed.contains(&TAG_FORBIDDEN_CHARS[..]) {
            return Err(ValidationError::InvalidTag(tag.to_string()));
        }
        let mut next = self.0.clone();
        next.push(trimmed.to_string());
        Ok(Self(next))
    }

    pub fn remove(&self, tag: &str) -> Self {
        Self(self.0.iter().filter(|t| *t != tag).cloned().collect())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl PartialEq for TodoTags {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut left: Vec<&String> = self.0.iter().collect();
        let mut right: Vec<&String> = other.0.iter().collect();
        left.sort();
        right.sort();
        left == right
    }
}

impl Display for TodoTags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

impl TryFrom<Vec<String>> for TodoTags {
    type Error = ValidationError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_vec(value)
    }
}

impl From<TodoTags> for Vec<String> {
    fn from(value: TodoTags) -> Self {
        value.0
    }
}

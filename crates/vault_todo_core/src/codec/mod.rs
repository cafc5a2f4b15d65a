//! Text formats: the persisted document and single Tasks-plugin lines.

pub mod document;
pub mod tasks_line;

//! To-do domain model.
//!
//! # Responsibility
//! - Define the canonical record and its validated field types.
//! - Keep a single typed record shape; raw text is converted only at the
//!   codec boundary.
//!
//! # Invariants
//! - Every record is identified by a stable `TodoId`.
//! - Records change only through copy-on-write updates.

pub mod dates;
pub mod todo;
pub mod value;

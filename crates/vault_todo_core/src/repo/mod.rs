//! Repository layer: the cached, write-through view of the to-do document.
//!
//! # Responsibility
//! - Keep the authoritative list in memory.
//! - Isolate storage details from service orchestration.
//!
//! # Invariants
//! - Repository writes commit to the cache only after the store succeeded.

pub mod todo_repo;

//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into UI-facing to-do APIs.
//! - Keep hosts decoupled from storage and codec details.

pub mod todo_service;

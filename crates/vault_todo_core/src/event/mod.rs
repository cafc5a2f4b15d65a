//! Mutation events and the bus that delivers them.
//!
//! # Responsibility
//! - Describe repository/service mutations as typed events.
//! - Fan events out to subscribers without coupling them to the publisher.

pub mod bus;
pub mod todo_event;

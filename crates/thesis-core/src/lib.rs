//! # thesis-core
//!
//! Core types for the thesis supervision engine.
//!
//! This crate holds everything that does not touch storage:
//! - Entity structs (semesters, topics, applications, works, grades, events)
//! - Status enums with state machine transitions
//! - Capacity ledger arithmetic
//! - Grade aggregation policy
//! - The semester clock and its deadline rules
//! - Request-scoped actors and their capabilities
//! - The workflow error taxonomy

pub mod clock;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod grading;
pub mod identity;
pub mod ids;
pub mod ledger;

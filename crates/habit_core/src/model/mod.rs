//! Habit tracker domain model.
//!
//! # Responsibility
//! - Define canonical records used by repositories, services and jobs.
//! - Bridge stored records into validator candidates.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Habit logs are append-only; habits are only written by user-facing paths.

pub mod habit;

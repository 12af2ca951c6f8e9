//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Act as the input-acceptance enforcement point for habit rules.
//! - Keep transport adapters decoupled from storage details.

pub mod habit_service;

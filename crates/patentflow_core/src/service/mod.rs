//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate engine evaluation and repository commits into use-case
//!   level APIs.
//! - Keep callers decoupled from storage details.

pub mod workflow_service;

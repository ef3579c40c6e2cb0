//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into linking engine operations.
//! - Keep request/bridge layers decoupled from storage details.

pub mod pages_service;

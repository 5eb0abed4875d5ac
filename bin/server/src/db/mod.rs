//! Database repositories for the brigade server.
//!
//! This module provides durable storage for:
//! - Conversation threads of every assistant

pub mod thread;

pub use thread::{PgThreadStore, PgThreadStores};

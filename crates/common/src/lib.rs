//! Classroom Common Library
//!
//! Shared code for the classroom services including:
//! - Lesson lifecycle (active lesson per room, presence, audit events)
//! - Database models and the lesson store
//! - LiveKit access tokens
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod lifecycle;
pub mod livekit;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::LessonStore;
pub use errors::{AppError, Result};
pub use lifecycle::LifecycleCoordinator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

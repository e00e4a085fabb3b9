//! Append-only lifecycle event log

use std::sync::Arc;

use crate::db::models::EventKind;
use crate::db::LessonStore;
use crate::errors::{AppError, Result};
use crate::metrics;

#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn LessonStore>,
}

impl EventLog {
    pub fn new(store: Arc<dyn LessonStore>) -> Self {
        Self { store }
    }

    /// Append an event given its wire name; unknown kinds are rejected
    pub async fn append(&self, lesson_id: i64, kind: &str, actor: &str) -> Result<()> {
        let kind = kind
            .parse::<EventKind>()
            .map_err(|message| AppError::validation("kind", message))?;

        self.append_kind(lesson_id, kind, actor).await
    }

    pub async fn append_kind(&self, lesson_id: i64, kind: EventKind, actor: &str) -> Result<()> {
        if lesson_id <= 0 {
            return Err(AppError::validation("lesson_id", "invalid lesson id"));
        }

        self.store.insert_event(lesson_id, kind, actor).await
    }

    /// Best-effort append. The audit trail never fails the state change that caused it.
    pub async fn record(&self, lesson_id: i64, kind: EventKind, actor: &str) {
        if let Err(e) = self.append_kind(lesson_id, kind, actor).await {
            tracing::warn!(
                lesson_id,
                kind = kind.as_str(),
                actor,
                error = %e,
                "Failed to record lifecycle event"
            );
            metrics::record_event_append_failure(kind);
        }
    }
}

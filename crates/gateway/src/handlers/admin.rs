//! Admin reporting

use axum::{extract::State, Json};

use crate::AppState;
use classroom_common::{db::LessonSummary, errors::Result};

/// Totals across all lessons, with a per-teacher breakdown
pub async fn summary(State(state): State<AppState>) -> Result<Json<LessonSummary>> {
    let summary = state.coordinator.summary().await?;

    tracing::debug!(total_lessons = summary.total_lessons, "Admin summary served");
    Ok(Json(summary))
}

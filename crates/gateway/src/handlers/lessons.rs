//! Lesson handlers: leave, end, and detail

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::{parse_lesson_id, ApiJson};
use crate::AppState;
use classroom_common::{
    db::models::Participant,
    errors::Result,
    lifecycle::LessonEnd,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LeaveBody {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub lesson_id: i64,
    pub name: String,
    /// False when the participant had already left or never joined
    pub left: bool,
    pub lesson_ended: bool,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub lesson_id: i64,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub name: String,
    pub role: String,
    pub joined_at: String,
    pub left_at: Option<String>,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            name: p.participant_name,
            role: p.role,
            joined_at: p.joined_at.to_rfc3339(),
            left_at: p.left_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LessonResponse {
    pub lesson_id: i64,
    pub room: String,
    pub teacher: String,
    pub active: bool,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub duration_sec: Option<i32>,
    pub participants: Vec<ParticipantResponse>,
}

pub async fn leave(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
    ApiJson(body): ApiJson<LeaveBody>,
) -> Result<Json<LeaveResponse>> {
    let lesson_id = parse_lesson_id(&lesson_id)?;
    let name = body.name.unwrap_or_default();
    let outcome = state.coordinator.handle_leave(lesson_id, &name).await?;

    Ok(Json(LeaveResponse {
        lesson_id,
        name: name.trim().to_string(),
        left: outcome.left,
        lesson_ended: outcome.lesson_ended,
    }))
}

pub async fn end(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
) -> Result<Json<EndResponse>> {
    let lesson_id = parse_lesson_id(&lesson_id)?;

    let status = match state.coordinator.handle_end(lesson_id).await? {
        LessonEnd::Ended => "ended",
        LessonEnd::AlreadyEnded => "already_ended",
    };

    Ok(Json(EndResponse { lesson_id, status }))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
) -> Result<Json<LessonResponse>> {
    let lesson_id = parse_lesson_id(&lesson_id)?;
    let detail = state.coordinator.lesson_detail(lesson_id).await?;
    let lesson = detail.lesson;

    Ok(Json(LessonResponse {
        lesson_id: lesson.id,
        active: lesson.is_active(),
        started_at: lesson.started_at.to_rfc3339(),
        ended_at: lesson.ended_at.map(|t| t.to_rfc3339()),
        duration_sec: lesson.duration_sec,
        room: lesson.room_name,
        teacher: lesson.teacher_name,
        participants: detail.participants.into_iter().map(Into::into).collect(),
    }))
}

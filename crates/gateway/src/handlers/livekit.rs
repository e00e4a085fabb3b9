//! Join handler: resolves the lesson and hands out a LiveKit token

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::handlers::ApiJson;
use crate::AppState;
use classroom_common::{
    db::models::Role,
    errors::Result,
    lifecycle::JoinRequest,
};

/// Missing and `null` fields both read as empty; the coordinator decides
/// what empty means for each.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinBody {
    #[serde(default)]
    #[validate(length(max = 128))]
    pub room: Option<String>,

    #[serde(default)]
    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default, rename = "teacherKey")]
    pub teacher_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub room: String,
    pub name: String,
    pub role: Role,
    pub lesson_id: i64,
    pub token: String,
    #[serde(rename = "wsUrl")]
    pub ws_url: String,
}

pub async fn join(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<JoinBody>,
) -> Result<Json<JoinResponse>> {
    let grant = state
        .coordinator
        .handle_join(JoinRequest {
            room: body.room.unwrap_or_default(),
            name: body.name.unwrap_or_default(),
            role: body.role.unwrap_or_default(),
            teacher_proof: body.teacher_key,
        })
        .await?;

    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    Ok(Json(JoinResponse {
        ws_url: state.media.ws_url(host),
        room: grant.room,
        name: grant.name,
        role: grant.role,
        lesson_id: grant.lesson_id,
        token: grant.credential,
    }))
}

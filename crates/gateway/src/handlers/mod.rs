//! API handlers module

pub mod admin;
pub mod health;
pub mod lessons;
pub mod livekit;

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use classroom_common::errors::AppError;
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that is parsed and validated before the handler runs.
///
/// Malformed bodies are `INVALID_JSON`, failed validation is `INVALID_REQUEST`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidJson {
                message: rejection.body_text(),
            })?;

        value.validate()?;
        Ok(Self(value))
    }
}

/// Lesson ids in paths are positive integers
pub fn parse_lesson_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("lesson_id", "invalid lesson id"))
}

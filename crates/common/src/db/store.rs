//! Storage seam for the lesson lifecycle
//!
//! Every method maps to a single statement against the backing store, so
//! per-row atomicity of the store is the only concurrency guarantee the
//! lifecycle relies on.

use crate::db::models::{EventKind, Lesson, LifecycleEvent, Participant, Role};
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of inserting a new lesson row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertLesson {
    /// A new active lesson was created
    Created(i64),
    /// The room already has an active lesson; nothing was written
    RoomBusy,
}

/// Lesson count for one teacher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherLessons {
    pub teacher: String,
    pub lessons: i64,
}

/// Read-only aggregate over all lessons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub total_lessons: i64,
    pub total_minutes: i64,
    pub teachers: Vec<TeacherLessons>,
}

#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Insert an active lesson unless the room already has one
    async fn insert_lesson(&self, room: &str, teacher: &str) -> Result<InsertLesson>;

    /// Set end timestamp and duration if the lesson is still active.
    /// Returns whether a row changed.
    async fn close_lesson(&self, lesson_id: i64) -> Result<bool>;

    /// Most recently started lesson in the room with no end timestamp
    async fn find_active_lesson(&self, room: &str) -> Result<Option<i64>>;

    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>>;

    /// Insert or revive the (lesson, name) presence row
    async fn upsert_participant(&self, lesson_id: i64, name: &str, role: Role) -> Result<()>;

    /// Set left timestamp if the participant is still present.
    /// Returns whether a row changed.
    async fn mark_participant_left(&self, lesson_id: i64, name: &str) -> Result<bool>;

    async fn find_participant(&self, lesson_id: i64, name: &str) -> Result<Option<Participant>>;

    async fn count_active_teachers(&self, lesson_id: i64) -> Result<u64>;

    async fn list_participants(&self, lesson_id: i64) -> Result<Vec<Participant>>;

    async fn insert_event(&self, lesson_id: i64, kind: EventKind, actor: &str) -> Result<()>;

    async fn list_events(&self, lesson_id: i64) -> Result<Vec<LifecycleEvent>>;

    async fn summary(&self) -> Result<LessonSummary>;

    async fn ping(&self) -> Result<()>;
}

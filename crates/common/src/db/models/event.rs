//! Lifecycle event entity: append-only audit trail per lesson

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The recognized lifecycle event kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LessonStarted,
    LessonEnded,
    Join,
    Leave,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LessonStarted => "lesson_started",
            EventKind::LessonEnded => "lesson_ended",
            EventKind::Join => "join",
            EventKind::Leave => "leave",
        }
    }
}

impl FromStr for EventKind {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson_started" => Ok(EventKind::LessonStarted),
            "lesson_ended" => Ok(EventKind::LessonEnded),
            "join" => Ok(EventKind::Join),
            "leave" => Ok(EventKind::Leave),
            other => Err(format!("invalid event type: {}", other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lesson_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    
    pub lesson_id: i64,
    
    #[sea_orm(column_type = "Text")]
    pub event_type: String,
    
    /// Empty for system-triggered events
    #[sea_orm(column_type = "Text")]
    pub actor_name: String,
    
    pub occurred_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lesson::Entity",
        from = "Column::LessonId",
        to = "super::lesson::Column::Id"
    )]
    Lesson,
}

impl Related<super::lesson::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lesson.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Lesson entity: one teaching session bound to a room

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lessons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    
    #[sea_orm(column_type = "Text")]
    pub room_name: String,
    
    #[sea_orm(column_type = "Text")]
    pub teacher_name: String,
    
    pub started_at: DateTimeWithTimeZone,
    
    /// Null while the lesson is active
    pub ended_at: Option<DateTimeWithTimeZone>,
    
    /// Whole seconds between start and end, set when the lesson ends
    pub duration_sec: Option<i32>,
}

impl Model {
    /// A lesson is active until it has an end timestamp
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::participant::Entity")]
    Participants,
    
    #[sea_orm(has_many = "super::event::Entity")]
    Events,
}

impl Related<super::participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

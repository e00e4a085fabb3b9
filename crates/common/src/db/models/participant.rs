//! Participant entity: one identity's presence within one lesson

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a participant holds in a lesson
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
    
    /// Lenient parse of a caller-declared role.
    ///
    /// Anything other than a (case-insensitive) `teacher` is a student.
    pub fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("teacher") {
            Role::Teacher
        } else {
            Role::Student
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::normalize(&s)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lesson_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lesson_id: i64,
    
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub participant_name: String,
    
    #[sea_orm(column_type = "Text")]
    pub role: String,
    
    pub joined_at: DateTimeWithTimeZone,
    
    /// Null while the participant is present
    pub left_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn role(&self) -> Role {
        Role::from(self.role.clone())
    }
    
    pub fn is_present(&self) -> bool {
        self.left_at.is_none()
    }
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

//! SeaORM entity models
//!
//! Database entities for lessons, their participants, and lifecycle events

mod lesson;
mod participant;
mod event;

pub use lesson::{
    Entity as LessonEntity,
    Model as Lesson,
    ActiveModel as LessonActiveModel,
    Column as LessonColumn,
};

pub use participant::{
    Entity as ParticipantEntity,
    Model as Participant,
    ActiveModel as ParticipantActiveModel,
    Column as ParticipantColumn,
    Role,
};

pub use event::{
    Entity as EventEntity,
    Model as LifecycleEvent,
    ActiveModel as EventActiveModel,
    Column as EventColumn,
    EventKind,
};

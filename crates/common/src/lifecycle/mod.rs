//! Lesson lifecycle: the active lesson per room, who is present, and the audit trail

pub mod coordinator;
pub mod events;
pub mod registry;
pub mod roster;

pub use coordinator::{
    CoordinatorPolicy, JoinGrant, JoinRequest, LeaveOutcome, LessonDetail, LifecycleCoordinator,
};
pub use events::EventLog;
pub use registry::{LessonEnd, LessonRegistry, LessonStart};
pub use roster::ParticipantRoster;

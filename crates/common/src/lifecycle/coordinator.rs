//! Request-level orchestration of the lesson lifecycle
//!
//! ```text
//! NO_ACTIVE_LESSON --teacher join--> ACTIVE_LESSON --end--> NO_ACTIVE_LESSON
//! ```
//!
//! A join resolves the lesson by role, records presence, and issues the media
//! credential. Presence and audit writes are best-effort; the credential is
//! the deliverable and its failure fails the join.

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::RoleAuthorizer;
use crate::config::AppConfig;
use crate::db::models::{Lesson, Participant, Role};
use crate::db::{LessonStore, LessonSummary};
use crate::errors::{AppError, Result};
use crate::lifecycle::events::EventLog;
use crate::lifecycle::registry::{LessonEnd, LessonRegistry, LessonStart};
use crate::lifecycle::roster::ParticipantRoster;
use crate::livekit::TokenIssuer;
use crate::metrics;

/// A caller asking to enter a room
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub room: String,
    pub name: String,
    /// Declared role; anything but `teacher` means student
    pub role: String,
    pub teacher_proof: Option<String>,
}

/// What a successful join hands back to the caller
#[derive(Debug, Clone)]
pub struct JoinGrant {
    pub room: String,
    pub name: String,
    /// Role after authorization, may differ from the one requested
    pub role: Role,
    pub lesson_id: i64,
    /// True when this join created the lesson
    pub lesson_started: bool,
    pub credential: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Presence actually changed
    pub left: bool,
    /// The lesson was closed because its last teacher left
    pub lesson_ended: bool,
}

#[derive(Debug, Clone)]
pub struct LessonDetail {
    pub lesson: Lesson,
    pub participants: Vec<Participant>,
}

/// Knobs the coordinator applies on top of the raw lifecycle
#[derive(Debug, Clone, Default)]
pub struct CoordinatorPolicy {
    /// Empty disables the teacher role
    pub teacher_key: String,
    pub auto_close_on_teacher_leave: bool,
}

impl CoordinatorPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            teacher_key: config.auth.teacher_key.clone(),
            auto_close_on_teacher_leave: config.lessons.auto_close_on_teacher_leave,
        }
    }
}

#[derive(Clone)]
pub struct LifecycleCoordinator {
    store: Arc<dyn LessonStore>,
    registry: LessonRegistry,
    roster: ParticipantRoster,
    authorizer: RoleAuthorizer,
    issuer: Arc<dyn TokenIssuer>,
    auto_close_on_teacher_leave: bool,
}

impl LifecycleCoordinator {
    pub fn new(store: Arc<dyn LessonStore>, issuer: Arc<dyn TokenIssuer>, policy: CoordinatorPolicy) -> Self {
        let events = EventLog::new(store.clone());

        Self {
            registry: LessonRegistry::new(store.clone(), events.clone()),
            roster: ParticipantRoster::new(store.clone(), events),
            authorizer: RoleAuthorizer::new(&policy.teacher_key),
            issuer,
            auto_close_on_teacher_leave: policy.auto_close_on_teacher_leave,
            store,
        }
    }

    pub fn registry(&self) -> &LessonRegistry {
        &self.registry
    }

    pub fn roster(&self) -> &ParticipantRoster {
        &self.roster
    }

    pub async fn handle_join(&self, request: JoinRequest) -> Result<JoinGrant> {
        let result = self.join(request).await;
        if let Err(ref e) = result {
            metrics::record_join_rejected(e.code().as_str());
        }
        result
    }

    async fn join(&self, request: JoinRequest) -> Result<JoinGrant> {
        let room = request.room.trim();
        let name = request.name.trim();
        if room.is_empty() || name.is_empty() {
            return Err(AppError::validation(
                if room.is_empty() { "room" } else { "name" },
                "room and name are required",
            ));
        }

        // Authorization happens before any write, so a rejected claim never starts a lesson
        let requested = Role::normalize(&request.role);
        let role = self
            .authorizer
            .effective_role(requested, request.teacher_proof.as_deref());
        if role != requested {
            info!(room, participant = name, "Teacher claim without valid proof, joining as student");
            metrics::record_teacher_downgrade();
        }

        let (lesson_id, lesson_started) = match role {
            Role::Teacher => {
                let start = self
                    .registry
                    .start_lesson(room, name)
                    .await
                    .map_err(|e| match e {
                        AppError::LessonStartFailed { .. } => e,
                        other => AppError::LessonStartFailed { message: other.to_string() },
                    })?;
                (start.lesson_id(), matches!(start, LessonStart::Started(_)))
            }
            Role::Student => (self.registry.get_active_lesson(room).await?, false),
        };

        if let Err(e) = self.roster.join(lesson_id, name, role).await {
            warn!(
                room,
                lesson_id,
                participant = name,
                error = %e,
                "Failed to record presence, continuing with join"
            );
            metrics::record_roster_failure();
        }

        let credential = self.issuer.issue(room, name, name, role).map_err(|e| {
            metrics::record_token_failure();
            match e {
                AppError::TokenIssue { .. } => e,
                other => AppError::TokenIssue { message: other.to_string() },
            }
        })?;

        info!(room, lesson_id, participant = name, role = role.as_str(), "Participant admitted");
        metrics::record_join(role);

        Ok(JoinGrant {
            room: room.to_string(),
            name: name.to_string(),
            role,
            lesson_id,
            lesson_started,
            credential,
        })
    }

    /// Record a departure, closing the lesson if policy says the last teacher
    /// leaving ends it.
    pub async fn handle_leave(&self, lesson_id: i64, name: &str) -> Result<LeaveOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "name is required"));
        }
        self.registry.find_lesson(lesson_id).await?;

        let was_teacher = self
            .roster
            .participant(lesson_id, name)
            .await?
            .map(|p| p.role() == Role::Teacher)
            .unwrap_or(false);

        let left = self.roster.leave(lesson_id, name).await?;

        let mut lesson_ended = false;
        if self.auto_close_on_teacher_leave && left && was_teacher && !self.roster.has_active_teacher(lesson_id).await? {
            lesson_ended = self.registry.end_lesson(lesson_id).await? == LessonEnd::Ended;
            if lesson_ended {
                info!(lesson_id, participant = name, "Last teacher left, lesson closed");
                metrics::record_lesson_ended("last_teacher_left");
            }
        }

        Ok(LeaveOutcome { left, lesson_ended })
    }

    /// End a lesson. Participants keep their presence rows untouched.
    pub async fn handle_end(&self, lesson_id: i64) -> Result<LessonEnd> {
        self.registry.find_lesson(lesson_id).await?;

        let outcome = self.registry.end_lesson(lesson_id).await?;
        if outcome == LessonEnd::Ended {
            metrics::record_lesson_ended("explicit");
        }
        Ok(outcome)
    }

    pub async fn lesson_detail(&self, lesson_id: i64) -> Result<LessonDetail> {
        let lesson = self.registry.find_lesson(lesson_id).await?;
        let participants = self.roster.participants(lesson_id).await?;

        Ok(LessonDetail { lesson, participants })
    }

    pub async fn summary(&self) -> Result<LessonSummary> {
        self.store.summary().await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

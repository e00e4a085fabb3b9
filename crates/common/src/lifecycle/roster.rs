//! Presence of participants within a lesson

use std::sync::Arc;

use tracing::debug;

use crate::db::models::{EventKind, Participant, Role};
use crate::db::LessonStore;
use crate::errors::Result;
use crate::lifecycle::events::EventLog;
use crate::metrics;

#[derive(Clone)]
pub struct ParticipantRoster {
    store: Arc<dyn LessonStore>,
    events: EventLog,
}

impl ParticipantRoster {
    pub fn new(store: Arc<dyn LessonStore>, events: EventLog) -> Self {
        Self { store, events }
    }

    /// Mark `name` present. A reconnect revives the existing record and the
    /// latest declared role wins.
    pub async fn join(&self, lesson_id: i64, name: &str, role: Role) -> Result<()> {
        self.store.upsert_participant(lesson_id, name, role).await?;

        debug!(lesson_id, participant = name, role = role.as_str(), "Participant joined");
        self.events.record(lesson_id, EventKind::Join, name).await;
        Ok(())
    }

    /// Mark `name` as gone. Returns false when they had already left or never joined.
    pub async fn leave(&self, lesson_id: i64, name: &str) -> Result<bool> {
        let changed = self.store.mark_participant_left(lesson_id, name).await?;

        if changed {
            debug!(lesson_id, participant = name, "Participant left");
            metrics::record_leave();
        } else {
            debug!(lesson_id, participant = name, "Leave without presence, keeping first leave time");
        }
        self.events.record(lesson_id, EventKind::Leave, name).await;
        Ok(changed)
    }

    /// Whether any teacher is still present in the lesson
    pub async fn has_active_teacher(&self, lesson_id: i64) -> Result<bool> {
        Ok(self.store.count_active_teachers(lesson_id).await? > 0)
    }

    pub async fn participant(&self, lesson_id: i64, name: &str) -> Result<Option<Participant>> {
        self.store.find_participant(lesson_id, name).await
    }

    pub async fn participants(&self, lesson_id: i64) -> Result<Vec<Participant>> {
        self.store.list_participants(lesson_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    const LESSON: i64 = 1;

    fn roster() -> (Arc<MemoryStore>, ParticipantRoster) {
        let store = Arc::new(MemoryStore::new());
        let roster = ParticipantRoster::new(store.clone(), EventLog::new(store.clone()));
        (store, roster)
    }

    #[tokio::test]
    async fn test_rejoin_keeps_single_row_with_latest_role() {
        let (_, roster) = roster();

        roster.join(LESSON, "Bob", Role::Student).await.unwrap();
        roster.join(LESSON, "Bob", Role::Teacher).await.unwrap();

        let participants = roster.participants(LESSON).await.unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].role(), Role::Teacher);
        assert!(participants[0].is_present());
    }

    #[tokio::test]
    async fn test_rejoin_after_leave_clears_left() {
        let (_, roster) = roster();

        roster.join(LESSON, "Alice", Role::Teacher).await.unwrap();
        assert!(roster.leave(LESSON, "Alice").await.unwrap());
        let left = roster.participant(LESSON, "Alice").await.unwrap().unwrap();
        assert!(left.left_at.is_some());

        roster.join(LESSON, "Alice", Role::Teacher).await.unwrap();
        let back = roster.participant(LESSON, "Alice").await.unwrap().unwrap();
        assert!(back.is_present());
        assert!(back.joined_at >= left.joined_at);
        assert_eq!(back.role(), Role::Teacher);
        assert_eq!(roster.participants(LESSON).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_leave_keeps_first_timestamp() {
        let (_, roster) = roster();

        roster.join(LESSON, "Bob", Role::Student).await.unwrap();
        assert!(roster.leave(LESSON, "Bob").await.unwrap());
        let first = roster.participant(LESSON, "Bob").await.unwrap().unwrap().left_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(!roster.leave(LESSON, "Bob").await.unwrap());
        let second = roster.participant(LESSON, "Bob").await.unwrap().unwrap().left_at;

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_not_an_error() {
        let (_, roster) = roster();

        assert!(!roster.leave(LESSON, "Ghost").await.unwrap());
        assert!(roster.participant(LESSON, "Ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_has_active_teacher() {
        let (_, roster) = roster();

        assert!(!roster.has_active_teacher(LESSON).await.unwrap());

        roster.join(LESSON, "Alice", Role::Teacher).await.unwrap();
        roster.join(LESSON, "Bob", Role::Student).await.unwrap();
        assert!(roster.has_active_teacher(LESSON).await.unwrap());

        roster.leave(LESSON, "Alice").await.unwrap();
        assert!(!roster.has_active_teacher(LESSON).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_active_teacher_with_two_teachers() {
        let (_, roster) = roster();

        roster.join(LESSON, "Alice", Role::Teacher).await.unwrap();
        roster.join(LESSON, "Dave", Role::Teacher).await.unwrap();
        roster.leave(LESSON, "Alice").await.unwrap();
        assert!(roster.has_active_teacher(LESSON).await.unwrap());

        roster.leave(LESSON, "Dave").await.unwrap();
        assert!(!roster.has_active_teacher(LESSON).await.unwrap());
    }

    #[tokio::test]
    async fn test_join_and_leave_are_logged() {
        let (store, roster) = roster();

        roster.join(LESSON, "Bob", Role::Student).await.unwrap();
        roster.leave(LESSON, "Bob").await.unwrap();

        let events = store.list_events(LESSON).await.unwrap();
        let logged: Vec<(&str, &str)> = events
            .iter()
            .map(|e| (e.event_type.as_str(), e.actor_name.as_str()))
            .collect();
        assert_eq!(logged, vec![("join", "Bob"), ("leave", "Bob")]);
    }
}

//! Per-room record of the active lesson
//!
//! A room is either idle or has exactly one active lesson. Starting a lesson
//! in a busy room resolves to the lesson already running there; ending is a
//! conditional update, so repeated or concurrent ends are harmless.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::models::{EventKind, Lesson};
use crate::db::{InsertLesson, LessonStore};
use crate::errors::{AppError, Result};
use crate::lifecycle::events::EventLog;
use crate::metrics;

/// Attempts before giving up on a room whose active lesson keeps ending under us
const MAX_START_ATTEMPTS: usize = 3;

/// Result of asking for a lesson to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStart {
    Started(i64),
    AlreadyActive(i64),
}

impl LessonStart {
    pub fn lesson_id(&self) -> i64 {
        match *self {
            LessonStart::Started(id) | LessonStart::AlreadyActive(id) => id,
        }
    }
}

/// Result of asking for a lesson to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonEnd {
    Ended,
    AlreadyEnded,
}

#[derive(Clone)]
pub struct LessonRegistry {
    store: Arc<dyn LessonStore>,
    events: EventLog,
}

impl LessonRegistry {
    pub fn new(store: Arc<dyn LessonStore>, events: EventLog) -> Self {
        Self { store, events }
    }

    /// Start a lesson in `room`, or return the one already active there
    pub async fn start_lesson(&self, room: &str, teacher: &str) -> Result<LessonStart> {
        for attempt in 1..=MAX_START_ATTEMPTS {
            match self.store.insert_lesson(room, teacher).await? {
                InsertLesson::Created(lesson_id) => {
                    info!(room, lesson_id, teacher, "Lesson started");
                    metrics::record_lesson_started();
                    self.events.record(lesson_id, EventKind::LessonStarted, teacher).await;
                    return Ok(LessonStart::Started(lesson_id));
                }
                InsertLesson::RoomBusy => {
                    if let Some(lesson_id) = self.store.find_active_lesson(room).await? {
                        debug!(room, lesson_id, teacher, "Room already has an active lesson");
                        return Ok(LessonStart::AlreadyActive(lesson_id));
                    }
                    // The conflicting lesson ended between the insert and the lookup
                    debug!(room, attempt, "Active lesson vanished during start, retrying");
                }
            }
        }

        Err(AppError::LessonStartFailed {
            message: format!("room {} changed state {} times during start", room, MAX_START_ATTEMPTS),
        })
    }

    /// Close the lesson if it is still active
    pub async fn end_lesson(&self, lesson_id: i64) -> Result<LessonEnd> {
        if !self.store.close_lesson(lesson_id).await? {
            debug!(lesson_id, "Lesson already ended");
            return Ok(LessonEnd::AlreadyEnded);
        }

        info!(lesson_id, "Lesson ended");
        self.events.record(lesson_id, EventKind::LessonEnded, "").await;
        Ok(LessonEnd::Ended)
    }

    /// Id of the most recently started active lesson in `room`
    pub async fn get_active_lesson(&self, room: &str) -> Result<i64> {
        self.store
            .find_active_lesson(room)
            .await?
            .ok_or_else(|| AppError::NoActiveLesson { room: room.to_string() })
    }

    pub async fn find_lesson(&self, lesson_id: i64) -> Result<Lesson> {
        self.store
            .find_lesson(lesson_id)
            .await?
            .ok_or(AppError::LessonNotFound { id: lesson_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::errors::ErrorCode;
    use chrono::{Duration, Utc};

    fn registry() -> (Arc<MemoryStore>, LessonRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = LessonRegistry::new(store.clone(), EventLog::new(store.clone()));
        (store, registry)
    }

    async fn count_events(store: &MemoryStore, lesson_id: i64, kind: EventKind) -> usize {
        store
            .list_events(lesson_id)
            .await
            .unwrap()
            .iter()
            .filter(|e| e.event_type == kind.as_str())
            .count()
    }

    #[tokio::test]
    async fn test_active_lesson_after_start() {
        let (store, registry) = registry();

        let start = registry.start_lesson("math101", "Alice").await.unwrap();
        let LessonStart::Started(id) = start else {
            panic!("expected a new lesson, got {:?}", start);
        };

        assert_eq!(registry.get_active_lesson("math101").await.unwrap(), id);
        assert_eq!(count_events(&store, id, EventKind::LessonStarted).await, 1);

        let events = store.list_events(id).await.unwrap();
        assert_eq!(events[0].actor_name, "Alice");
    }

    #[tokio::test]
    async fn test_no_active_lesson() {
        let (_, registry) = registry();

        let err = registry.get_active_lesson("science202").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoActiveLesson);
    }

    #[tokio::test]
    async fn test_second_start_joins_active_lesson() {
        let (store, registry) = registry();

        let first = registry.start_lesson("math101", "Alice").await.unwrap();
        let second = registry.start_lesson("math101", "Dave").await.unwrap();

        assert_eq!(second, LessonStart::AlreadyActive(first.lesson_id()));
        assert_eq!(count_events(&store, first.lesson_id(), EventKind::LessonStarted).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_starts_yield_one_lesson() {
        let (_, registry) = registry();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.start_lesson("math101", &format!("T{}", i)).await })
            })
            .collect();

        let mut ids = Vec::new();
        let mut started = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if matches!(outcome, LessonStart::Started(_)) {
                started += 1;
            }
            ids.push(outcome.lesson_id());
        }

        assert_eq!(started, 1);
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_double_end_is_idempotent() {
        let (store, registry) = registry();
        let id = registry.start_lesson("math101", "Alice").await.unwrap().lesson_id();

        assert_eq!(registry.end_lesson(id).await.unwrap(), LessonEnd::Ended);
        assert_eq!(registry.end_lesson(id).await.unwrap(), LessonEnd::AlreadyEnded);
        assert_eq!(count_events(&store, id, EventKind::LessonEnded).await, 1);

        let ended = store.list_events(id).await.unwrap();
        assert_eq!(ended.last().unwrap().actor_name, "");

        let lesson = registry.find_lesson(id).await.unwrap();
        assert!(lesson.ended_at.is_some());
        assert!(lesson.duration_sec.is_some());

        let err = registry.get_active_lesson("math101").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoActiveLesson);
    }

    #[tokio::test]
    async fn test_concurrent_ends_record_one_event() {
        let (store, registry) = registry();
        let id = registry.start_lesson("math101", "Alice").await.unwrap().lesson_id();

        let a = tokio::spawn({
            let registry = registry.clone();
            async move { registry.end_lesson(id).await }
        });
        let b = tokio::spawn({
            let registry = registry.clone();
            async move { registry.end_lesson(id).await }
        });

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        assert_eq!(outcomes.iter().filter(|o| **o == LessonEnd::Ended).count(), 1);
        assert_eq!(count_events(&store, id, EventKind::LessonEnded).await, 1);
    }

    #[tokio::test]
    async fn test_tie_break_picks_latest_start() {
        let (store, registry) = registry();
        let now = Utc::now();

        let template = Lesson {
            id: 0,
            room_name: "math101".into(),
            teacher_name: "Alice".into(),
            started_at: (now - Duration::minutes(30)).into(),
            ended_at: None,
            duration_sec: None,
        };
        let older = store.import_lesson(template.clone()).await;
        let newer = store
            .import_lesson(Lesson { started_at: now.into(), ..template.clone() })
            .await;
        // Imported after `newer` but started earlier
        let stale = store
            .import_lesson(Lesson { started_at: (now - Duration::hours(2)).into(), ..template })
            .await;

        assert!(older < newer && newer < stale);
        assert_eq!(registry.get_active_lesson("math101").await.unwrap(), newer);
    }

    #[tokio::test]
    async fn test_room_reusable_after_end() {
        let (_, registry) = registry();

        let first = registry.start_lesson("math101", "Alice").await.unwrap().lesson_id();
        registry.end_lesson(first).await.unwrap();

        let second = registry.start_lesson("math101", "Alice").await.unwrap();
        assert!(matches!(second, LessonStart::Started(id) if id != first));
    }

    #[tokio::test]
    async fn test_find_unknown_lesson() {
        let (_, registry) = registry();

        let err = registry.find_lesson(404).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::LessonNotFound);
    }
}

//! In-process lesson store
//!
//! Mirrors the conditional semantics of the Postgres repository (single active
//! lesson per room, upsert on reconnect, conditional close and leave) behind a
//! single mutex. Used by tests and by local runs without a database.

use crate::db::models::{EventKind, Lesson, LifecycleEvent, Participant, Role};
use crate::db::store::{InsertLesson, LessonStore, LessonSummary, TeacherLessons};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    lessons: BTreeMap<i64, Lesson>,
    participants: HashMap<(i64, String), Participant>,
    events: Vec<LifecycleEvent>,
    next_lesson_id: i64,
    next_event_id: i64,
}

impl State {
    fn lesson_id(&mut self) -> i64 {
        self.next_lesson_id += 1;
        self.next_lesson_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a lesson record verbatim, bypassing the one-active-per-room check.
    ///
    /// The stored id is freshly assigned; the returned id is the one to use.
    #[cfg(test)]
    pub(crate) async fn import_lesson(&self, mut lesson: Lesson) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.lesson_id();
        lesson.id = id;
        state.lessons.insert(id, lesson);
        id
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn insert_lesson(&self, room: &str, teacher: &str) -> Result<InsertLesson> {
        let mut state = self.state.lock().await;

        if state.lessons.values().any(|l| l.room_name == room && l.is_active()) {
            return Ok(InsertLesson::RoomBusy);
        }

        let id = state.lesson_id();
        state.lessons.insert(
            id,
            Lesson {
                id,
                room_name: room.to_string(),
                teacher_name: teacher.to_string(),
                started_at: now(),
                ended_at: None,
                duration_sec: None,
            },
        );

        Ok(InsertLesson::Created(id))
    }

    async fn close_lesson(&self, lesson_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;

        match state.lessons.get_mut(&lesson_id) {
            Some(lesson) if lesson.is_active() => {
                let ended = now();
                let elapsed = (ended - lesson.started_at).num_seconds();
                lesson.ended_at = Some(ended);
                lesson.duration_sec = Some(elapsed.clamp(0, i32::MAX as i64) as i32);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_active_lesson(&self, room: &str) -> Result<Option<i64>> {
        let state = self.state.lock().await;

        Ok(state
            .lessons
            .values()
            .filter(|l| l.room_name == room && l.is_active())
            .max_by_key(|l| (l.started_at, l.id))
            .map(|l| l.id))
    }

    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>> {
        let state = self.state.lock().await;
        Ok(state.lessons.get(&lesson_id).cloned())
    }

    async fn upsert_participant(&self, lesson_id: i64, name: &str, role: Role) -> Result<()> {
        let mut state = self.state.lock().await;
        let joined_at = now();

        state
            .participants
            .entry((lesson_id, name.to_string()))
            .and_modify(|p| {
                p.role = role.as_str().to_string();
                p.joined_at = joined_at;
                p.left_at = None;
            })
            .or_insert_with(|| Participant {
                lesson_id,
                participant_name: name.to_string(),
                role: role.as_str().to_string(),
                joined_at,
                left_at: None,
            });

        Ok(())
    }

    async fn mark_participant_left(&self, lesson_id: i64, name: &str) -> Result<bool> {
        let mut state = self.state.lock().await;

        match state.participants.get_mut(&(lesson_id, name.to_string())) {
            Some(p) if p.is_present() => {
                p.left_at = Some(now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_participant(&self, lesson_id: i64, name: &str) -> Result<Option<Participant>> {
        let state = self.state.lock().await;
        Ok(state.participants.get(&(lesson_id, name.to_string())).cloned())
    }

    async fn count_active_teachers(&self, lesson_id: i64) -> Result<u64> {
        let state = self.state.lock().await;

        Ok(state
            .participants
            .values()
            .filter(|p| p.lesson_id == lesson_id && p.role() == Role::Teacher && p.is_present())
            .count() as u64)
    }

    async fn list_participants(&self, lesson_id: i64) -> Result<Vec<Participant>> {
        let state = self.state.lock().await;

        let mut participants: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| p.lesson_id == lesson_id)
            .cloned()
            .collect();
        participants.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.participant_name.cmp(&b.participant_name))
        });

        Ok(participants)
    }

    async fn insert_event(&self, lesson_id: i64, kind: EventKind, actor: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.next_event_id += 1;
        let id = state.next_event_id;

        state.events.push(LifecycleEvent {
            id,
            lesson_id,
            event_type: kind.as_str().to_string(),
            actor_name: actor.to_string(),
            occurred_at: now(),
        });

        Ok(())
    }

    async fn list_events(&self, lesson_id: i64) -> Result<Vec<LifecycleEvent>> {
        let state = self.state.lock().await;

        Ok(state
            .events
            .iter()
            .filter(|e| e.lesson_id == lesson_id)
            .cloned()
            .collect())
    }

    async fn summary(&self) -> Result<LessonSummary> {
        let state = self.state.lock().await;

        let total_seconds: i64 = state
            .lessons
            .values()
            .filter_map(|l| l.duration_sec)
            .map(i64::from)
            .sum();

        let mut per_teacher: BTreeMap<&str, i64> = BTreeMap::new();
        for lesson in state.lessons.values() {
            *per_teacher.entry(lesson.teacher_name.as_str()).or_default() += 1;
        }

        Ok(LessonSummary {
            total_lessons: state.lessons.len() as i64,
            total_minutes: total_seconds / 60,
            teachers: per_teacher
                .into_iter()
                .map(|(teacher, lessons)| TeacherLessons {
                    teacher: teacher.to_string(),
                    lessons,
                })
                .collect(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

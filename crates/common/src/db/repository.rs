//! Postgres-backed lesson store
//!
//! Conditional writes (`... AND ended_at IS NULL`, `ON CONFLICT`) carry all of
//! the lifecycle's concurrency guarantees; no statement is built from caller
//! input.

use crate::db::models::*;
use crate::db::store::{InsertLesson, LessonStore, LessonSummary, TeacherLessons};
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Statement,
};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

#[async_trait]
impl LessonStore for Repository {
    // ========================================================================
    // Lesson Operations
    // ========================================================================

    async fn insert_lesson(&self, room: &str, teacher: &str) -> Result<InsertLesson> {
        // The partial unique index on open lessons turns a second start into a no-op
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO lessons (room_name, teacher_name, started_at)
            VALUES ($1, $2, now())
            ON CONFLICT (room_name) WHERE ended_at IS NULL DO NOTHING
            RETURNING id
            "#,
            vec![room.into(), teacher.into()],
        );

        match self.conn().query_one(stmt).await? {
            Some(row) => Ok(InsertLesson::Created(row.try_get::<i64>("", "id")?)),
            None => Ok(InsertLesson::RoomBusy),
        }
    }

    async fn close_lesson(&self, lesson_id: i64) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE lessons
            SET ended_at = now(),
                duration_sec = EXTRACT(EPOCH FROM (now() - started_at))::int
            WHERE id = $1
              AND ended_at IS NULL
            "#,
            vec![lesson_id.into()],
        );

        let result = self.conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_active_lesson(&self, room: &str) -> Result<Option<i64>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT id
            FROM lessons
            WHERE room_name = $1
              AND ended_at IS NULL
            ORDER BY started_at DESC, id DESC
            LIMIT 1
            "#,
            vec![room.into()],
        );

        match self.conn().query_one(stmt).await? {
            Some(row) => Ok(Some(row.try_get::<i64>("", "id")?)),
            None => Ok(None),
        }
    }

    async fn find_lesson(&self, lesson_id: i64) -> Result<Option<Lesson>> {
        LessonEntity::find_by_id(lesson_id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Participant Operations
    // ========================================================================

    async fn upsert_participant(&self, lesson_id: i64, name: &str, role: Role) -> Result<()> {
        // A reconnect revives the existing row instead of creating a duplicate
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO lesson_participants
                (lesson_id, participant_name, role, joined_at, left_at)
            VALUES ($1, $2, $3, now(), NULL)
            ON CONFLICT (lesson_id, participant_name)
            DO UPDATE SET
                role = EXCLUDED.role,
                joined_at = EXCLUDED.joined_at,
                left_at = NULL
            "#,
            vec![lesson_id.into(), name.into(), role.as_str().into()],
        );

        self.conn().execute(stmt).await?;
        Ok(())
    }

    async fn mark_participant_left(&self, lesson_id: i64, name: &str) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE lesson_participants
            SET left_at = now()
            WHERE lesson_id = $1
              AND participant_name = $2
              AND left_at IS NULL
            "#,
            vec![lesson_id.into(), name.into()],
        );

        let result = self.conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_participant(&self, lesson_id: i64, name: &str) -> Result<Option<Participant>> {
        ParticipantEntity::find_by_id((lesson_id, name.to_string()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn count_active_teachers(&self, lesson_id: i64) -> Result<u64> {
        ParticipantEntity::find()
            .filter(ParticipantColumn::LessonId.eq(lesson_id))
            .filter(ParticipantColumn::Role.eq(Role::Teacher.as_str()))
            .filter(ParticipantColumn::LeftAt.is_null())
            .count(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_participants(&self, lesson_id: i64) -> Result<Vec<Participant>> {
        ParticipantEntity::find()
            .filter(ParticipantColumn::LessonId.eq(lesson_id))
            .order_by_asc(ParticipantColumn::JoinedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Event Operations
    // ========================================================================

    async fn insert_event(&self, lesson_id: i64, kind: EventKind, actor: &str) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO lesson_events
                (lesson_id, event_type, actor_name, occurred_at)
            VALUES ($1, $2, $3, now())
            "#,
            vec![lesson_id.into(), kind.as_str().into(), actor.into()],
        );

        self.conn().execute(stmt).await?;
        Ok(())
    }

    async fn list_events(&self, lesson_id: i64) -> Result<Vec<LifecycleEvent>> {
        EventEntity::find()
            .filter(EventColumn::LessonId.eq(lesson_id))
            .order_by_asc(EventColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    async fn summary(&self) -> Result<LessonSummary> {
        let totals = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT count(*)::bigint AS total_lessons,
                   COALESCE(sum(duration_sec) / 60, 0)::bigint AS total_minutes
            FROM lessons
            "#,
        );

        let (total_lessons, total_minutes) = match self.conn().query_one(totals).await? {
            Some(row) => (
                row.try_get::<i64>("", "total_lessons")?,
                row.try_get::<i64>("", "total_minutes")?,
            ),
            None => (0, 0),
        };

        let per_teacher = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT teacher_name, count(*)::bigint AS lessons
            FROM lessons
            GROUP BY teacher_name
            ORDER BY teacher_name
            "#,
        );

        let teachers = self
            .conn()
            .query_all(per_teacher)
            .await?
            .into_iter()
            .map(|row| -> Result<TeacherLessons> {
                Ok(TeacherLessons {
                    teacher: row.try_get::<String>("", "teacher_name")?,
                    lessons: row.try_get::<i64>("", "lessons")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LessonSummary {
            total_lessons,
            total_minutes,
            teachers,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

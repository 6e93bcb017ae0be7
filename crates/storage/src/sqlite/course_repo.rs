use lesson_core::model::{Course, CourseId, Milestone, Module, VideoRef};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::position_to_i64;
use crate::repository::{CourseRepository, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title, published_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                published_at = excluded.published_at
            ",
        )
        .bind(course.id().as_str())
        .bind(course.title())
        .bind(course.published_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // Replace the layout wholesale; the flattening is frozen per publish.
        sqlx::query("DELETE FROM modules WHERE course_id = ?1")
            .bind(course.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM milestones WHERE course_id = ?1")
            .bind(course.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        let mut global_position = 0_usize;
        for (milestone_position, milestone) in course.milestones().iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO milestones (course_id, position, title)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(course.id().as_str())
            .bind(position_to_i64(milestone_position)?)
            .bind(milestone.title())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for module in milestone.modules() {
                sqlx::query(
                    r"
                    INSERT INTO modules (course_id, position, milestone_position, title, video_url)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(course.id().as_str())
                .bind(position_to_i64(global_position)?)
                .bind(position_to_i64(milestone_position)?)
                .bind(module.title())
                .bind(module.video().as_str())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
                global_position += 1;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, published_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let milestone_rows = sqlx::query(
            r"
            SELECT position, title
            FROM milestones
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let module_rows = sqlx::query(
            r"
            SELECT position, milestone_position, title, video_url
            FROM modules
            WHERE course_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        course_from_rows(&row, &milestone_rows, &module_rows).map(Some)
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id FROM courses
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let id = CourseId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
            if let Some(course) = self.get_course(&id).await? {
                courses.push(course);
            }
        }
        Ok(courses)
    }
}

fn course_from_rows(
    course_row: &SqliteRow,
    milestone_rows: &[SqliteRow],
    module_rows: &[SqliteRow],
) -> Result<Course, StorageError> {
    let mut milestones = Vec::with_capacity(milestone_rows.len());
    for milestone_row in milestone_rows {
        let milestone_position: i64 = milestone_row.try_get("position").map_err(ser)?;
        let mut modules = Vec::new();
        for module_row in module_rows {
            let owner: i64 = module_row.try_get("milestone_position").map_err(ser)?;
            if owner != milestone_position {
                continue;
            }
            let video = VideoRef::parse(module_row.try_get::<String, _>("video_url").map_err(ser)?)
                .map_err(ser)?;
            modules.push(
                Module::new(module_row.try_get::<String, _>("title").map_err(ser)?, video)
                    .map_err(ser)?,
            );
        }
        milestones.push(
            Milestone::new(
                milestone_row.try_get::<String, _>("title").map_err(ser)?,
                modules,
            )
            .map_err(ser)?,
        );
    }

    Course::new(
        CourseId::new(course_row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        course_row.try_get::<String, _>("title").map_err(ser)?,
        milestones,
        course_row.try_get("published_at").map_err(ser)?,
    )
    .map_err(ser)
}

//! Learner progress and course enrollment.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::{load_node, owner_of, Node, NodeKind};
use crate::db::now_ts;
use crate::error::{ContentError, ContentResult};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub chapter_id: String,
    pub section_id: Option<String>,
    pub is_completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub title: String,
    pub percentage: u32,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub completed: Vec<CourseProgress>,
    pub in_progress: Vec<CourseProgress>,
}

/// Records a purchase for a published course. Repeated calls return the
/// original record.
pub fn record_purchase(conn: &Connection, user_id: &str, course_id: &str) -> ContentResult<Purchase> {
    let course = load_node(conn, NodeKind::Course, course_id)?;
    if !course.is_published() {
        return Err(ContentError::invalid_with(
            "course is not published",
            vec!["course_not_published".to_string()],
        ));
    }
    conn.execute(
        "INSERT OR IGNORE INTO purchases(id, user_id, course_id, created_at) VALUES(?, ?, ?, ?)",
        params![Uuid::new_v4().to_string(), user_id, course_id, now_ts()],
    )
    .map_err(ContentError::from_write)?;
    let purchase = conn.query_row(
        "SELECT id, user_id, course_id, created_at FROM purchases WHERE user_id = ? AND course_id = ?",
        params![user_id, course_id],
        |r| {
            Ok(Purchase {
                id: r.get(0)?,
                user_id: r.get(1)?,
                course_id: r.get(2)?,
                created_at: r.get(3)?,
            })
        },
    )?;
    tracing::info!(user_id, course_id, "purchase recorded");
    Ok(purchase)
}

pub fn has_purchased(conn: &Connection, user_id: &str, course_id: &str) -> ContentResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM purchases WHERE user_id = ? AND course_id = ?",
            params![user_id, course_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Upserts the (user, chapter) progress row. `section_id` is linked only when
/// the row is first created.
pub fn mark_progress(
    conn: &Connection,
    user_id: &str,
    chapter_id: &str,
    section_id: Option<&str>,
    completed: bool,
) -> ContentResult<UserProgress> {
    let Node::Chapter(chapter) = load_node(conn, NodeKind::Chapter, chapter_id)? else {
        return Err(ContentError::not_found(NodeKind::Chapter, chapter_id));
    };
    if let Some(section_id) = section_id {
        let parent: Option<String> = conn
            .query_row(
                "SELECT chapter_id FROM sections WHERE id = ?",
                [section_id],
                |r| r.get(0),
            )
            .optional()?;
        match parent {
            None => return Err(ContentError::not_found(NodeKind::Section, section_id)),
            Some(p) if p != chapter_id => {
                return Err(ContentError::invalid_with(
                    "section does not belong to chapter",
                    vec![format!("not_a_child:{}", section_id)],
                ))
            }
            Some(_) => {}
        }
    }

    let owner = owner_of(conn, NodeKind::Course, &chapter.course_id)?;
    let allowed = chapter.is_free
        || owner == user_id
        || has_purchased(conn, user_id, &chapter.course_id)?;
    if !allowed {
        return Err(ContentError::forbidden(NodeKind::Chapter, chapter_id));
    }

    let ts = now_ts();
    conn.execute(
        "INSERT INTO user_progress(user_id, chapter_id, section_id, is_completed, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id, chapter_id) DO UPDATE SET
           is_completed = excluded.is_completed,
           updated_at = excluded.updated_at",
        params![user_id, chapter_id, section_id, i64::from(completed), ts, ts],
    )
    .map_err(ContentError::from_write)?;

    tracing::debug!(user_id, chapter_id, completed, "progress marked");
    load_progress(conn, user_id, chapter_id)
}

fn load_progress(conn: &Connection, user_id: &str, chapter_id: &str) -> ContentResult<UserProgress> {
    Ok(conn.query_row(
        "SELECT user_id, chapter_id, section_id, is_completed, created_at, updated_at
         FROM user_progress WHERE user_id = ? AND chapter_id = ?",
        params![user_id, chapter_id],
        |r| {
            Ok(UserProgress {
                user_id: r.get(0)?,
                chapter_id: r.get(1)?,
                section_id: r.get(2)?,
                is_completed: r.get::<_, i64>(3)? != 0,
                created_at: r.get(4)?,
                updated_at: r.get(5)?,
            })
        },
    )?)
}

/// Completed chapter ids for `user_id` under `course_id`.
pub fn completed_chapters(conn: &Connection, user_id: &str, course_id: &str) -> ContentResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT up.chapter_id
         FROM user_progress up
         JOIN chapters ch ON ch.id = up.chapter_id
         WHERE up.user_id = ? AND ch.course_id = ? AND up.is_completed = 1",
    )?;
    let ids = stmt
        .query_map(params![user_id, course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Completed published chapters over published chapters, floored to a
/// whole percent. A course without published chapters is at 0.
pub fn course_completion_percentage(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> ContentResult<u32> {
    load_node(conn, NodeKind::Course, course_id)?;
    let published: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chapters WHERE course_id = ? AND is_published = 1",
        [course_id],
        |r| r.get(0),
    )?;
    if published == 0 {
        return Ok(0);
    }
    let completed: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT up.chapter_id)
         FROM user_progress up
         JOIN chapters ch ON ch.id = up.chapter_id
         WHERE up.user_id = ? AND ch.course_id = ? AND ch.is_published = 1 AND up.is_completed = 1",
        params![user_id, course_id],
        |r| r.get(0),
    )?;
    Ok(u32::try_from(completed * 100 / published).unwrap_or(100))
}

/// Purchased courses split by whether every published chapter is complete.
pub fn dashboard(conn: &Connection, user_id: &str) -> ContentResult<Dashboard> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title
         FROM purchases p
         JOIN courses c ON c.id = p.course_id
         WHERE p.user_id = ?
         ORDER BY p.created_at, c.id",
    )?;
    let courses = stmt
        .query_map([user_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Dashboard::default();
    for (course_id, title) in courses {
        let percentage = course_completion_percentage(conn, user_id, &course_id)?;
        let entry = CourseProgress {
            course_id,
            title,
            percentage,
        };
        if percentage >= 100 {
            out.completed.push(entry);
        } else {
            out.in_progress.push(entry);
        }
    }
    Ok(out)
}

//! Per-user ordered lists: favorite videos and profile links.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::catalog::visible_item;
use super::position::{next_position, FavoriteVideos, ProfileLinks};
use super::ItemKind;
use crate::db::now_ts;
use crate::error::{ContentError, ContentResult};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteVideo {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub title: String,
    pub url: Option<String>,
    pub position: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileLink {
    pub id: String,
    pub user_id: String,
    pub label: String,
    pub url: String,
    pub position: i64,
}

pub fn add_favorite(conn: &Connection, user_id: &str, video_id: &str) -> ContentResult<FavoriteVideo> {
    let (item, _) = visible_item(conn, video_id, Some(user_id))?;
    if item.kind != ItemKind::Video {
        return Err(ContentError::invalid_with(
            "only video items can be favorited",
            vec![format!("not_a_video:{}", video_id)],
        ));
    }
    let id = Uuid::new_v4().to_string();
    let position = next_position(conn, &FavoriteVideos, user_id)?;
    conn.execute(
        "INSERT INTO favorite_videos(id, user_id, video_id, position, created_at) VALUES(?, ?, ?, ?, ?)",
        params![id, user_id, video_id, position, now_ts()],
    )
    .map_err(ContentError::from_write)?;
    tracing::info!(user_id, video_id, position, "favorite added");
    list_favorites(conn, user_id)?
        .into_iter()
        .find(|f| f.id == id)
        .ok_or_else(|| ContentError::NotFound {
            kind: "favorite video",
            id,
        })
}

/// The user's favorites in order. The video url is left out while the
/// video is locked or no longer visible to the user.
pub fn list_favorites(conn: &Connection, user_id: &str) -> ContentResult<Vec<FavoriteVideo>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id, f.video_id, i.title, i.url, f.position
         FROM favorite_videos f
         JOIN section_items i ON i.id = f.video_id
         WHERE f.user_id = ?
         ORDER BY f.position, f.id",
    )?;
    let mut rows = stmt
        .query_map([user_id], |r| {
            Ok(FavoriteVideo {
                id: r.get(0)?,
                user_id: r.get(1)?,
                video_id: r.get(2)?,
                title: r.get(3)?,
                url: r.get(4)?,
                position: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for fav in &mut rows {
        match visible_item(conn, &fav.video_id, Some(user_id)) {
            Ok((_, access)) if !access.locked => {}
            Ok(_) | Err(ContentError::NotFound { .. }) => fav.url = None,
            Err(e) => return Err(e),
        }
    }
    Ok(rows)
}

pub fn remove_favorite(conn: &Connection, user_id: &str, favorite_id: &str) -> ContentResult<()> {
    remove_owned(conn, "favorite_videos", "favorite video", user_id, favorite_id)
}

pub fn add_profile_link(
    conn: &Connection,
    user_id: &str,
    label: &str,
    url: &str,
) -> ContentResult<ProfileLink> {
    let label = label.trim();
    let url = url.trim();
    let mut reasons = Vec::new();
    if label.is_empty() {
        reasons.push("missing_field:label".to_string());
    }
    if url.is_empty() {
        reasons.push("missing_field:url".to_string());
    }
    if !reasons.is_empty() {
        return Err(ContentError::invalid_with("profile link needs label and url", reasons));
    }
    let id = Uuid::new_v4().to_string();
    let position = next_position(conn, &ProfileLinks, user_id)?;
    conn.execute(
        "INSERT INTO profile_links(id, user_id, label, url, position, created_at) VALUES(?, ?, ?, ?, ?, ?)",
        params![id, user_id, label, url, position, now_ts()],
    )
    .map_err(ContentError::from_write)?;
    Ok(ProfileLink {
        id,
        user_id: user_id.to_string(),
        label: label.to_string(),
        url: url.to_string(),
        position,
    })
}

pub fn list_profile_links(conn: &Connection, user_id: &str) -> ContentResult<Vec<ProfileLink>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, label, url, position
         FROM profile_links
         WHERE user_id = ?
         ORDER BY position, id",
    )?;
    let rows = stmt
        .query_map([user_id], |r| {
            Ok(ProfileLink {
                id: r.get(0)?,
                user_id: r.get(1)?,
                label: r.get(2)?,
                url: r.get(3)?,
                position: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn remove_profile_link(conn: &Connection, user_id: &str, link_id: &str) -> ContentResult<()> {
    remove_owned(conn, "profile_links", "profile link", user_id, link_id)
}

fn remove_owned(
    conn: &Connection,
    table: &str,
    label: &'static str,
    user_id: &str,
    id: &str,
) -> ContentResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ? AND user_id = ?", table);
    if conn.execute(&sql, params![id, user_id])? > 0 {
        return Ok(());
    }
    let exists = conn
        .query_row(&format!("SELECT 1 FROM {} WHERE id = ?", table), [id], |_| Ok(()))
        .optional()?
        .is_some();
    if exists {
        Err(ContentError::Forbidden {
            kind: label,
            id: id.to_string(),
        })
    } else {
        Err(ContentError::NotFound {
            kind: label,
            id: id.to_string(),
        })
    }
}

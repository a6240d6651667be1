//! Read-side views: categories, course listings and content trees.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::progress::{completed_chapters, course_completion_percentage, has_purchased};
use super::{list_children, load_node, Chapter, Course, Item, Node, NodeKind, Post, PostChapter, Section};
use crate::error::{ContentError, ContentResult};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub category_name: Option<String>,
    pub chapter_count: i64,
    pub published_chapter_count: i64,
    pub progress: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTree {
    #[serde(flatten)]
    pub section: Section,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterTree {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub locked: bool,
    pub completed: bool,
    pub sections: Vec<SectionTree>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    pub course: Course,
    pub is_owner: bool,
    pub purchased: bool,
    pub progress: Option<u32>,
    pub chapters: Vec<ChapterTree>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTree {
    pub post: Post,
    pub is_owner: bool,
    pub chapters: Vec<PostChapter>,
}

pub fn create_category(conn: &Connection, name: &str) -> ContentResult<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ContentError::invalid_with(
            "category name must not be empty",
            vec!["missing_field:name".to_string()],
        ));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO categories(id, name) VALUES(?, ?)",
        (&id, name),
    )
    .map_err(ContentError::from_write)?;
    Ok(Category {
        id,
        name: name.to_string(),
    })
}

pub fn list_categories(conn: &Connection) -> ContentResult<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Category {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Clone, Debug, Default)]
pub struct CourseFilter {
    /// Only the courses this user owns (drafts included).
    pub owner: Option<String>,
    pub title_contains: Option<String>,
    pub category_id: Option<String>,
}

/// Course listing. Without `owner` only published courses are returned.
pub fn list_courses(
    conn: &Connection,
    filter: &CourseFilter,
    viewer: Option<&str>,
) -> ContentResult<Vec<CourseSummary>> {
    let mut where_clause = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    match &filter.owner {
        Some(owner) => {
            where_clause.push("c.user_id = ?");
            values.push(Value::Text(owner.clone()));
        }
        None => where_clause.push("c.is_published = 1"),
    }
    if let Some(q) = &filter.title_contains {
        where_clause.push("c.title LIKE ? ESCAPE '\\'");
        values.push(Value::Text(format!("%{}%", escape_like(q))));
    }
    if let Some(cat) = &filter.category_id {
        where_clause.push("c.category_id = ?");
        values.push(Value::Text(cat.clone()));
    }
    // Correlated subqueries keep the counts from multiplying through joins.
    let sql = format!(
        "SELECT
           c.id,
           (SELECT name FROM categories cat WHERE cat.id = c.category_id),
           (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id),
           (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id AND ch.is_published = 1)
         FROM courses c
         WHERE {}
         ORDER BY c.created_at DESC, c.id",
        where_clause.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, category_name, chapter_count, published_chapter_count) in rows {
        let Node::Course(course) = load_node(conn, NodeKind::Course, &id)? else {
            continue;
        };
        let progress = match viewer {
            Some(user) if has_purchased(conn, user, &id)? => {
                Some(course_completion_percentage(conn, user, &id)?)
            }
            _ => None,
        };
        out.push(CourseSummary {
            course,
            category_name,
            chapter_count,
            published_chapter_count,
            progress,
        });
    }
    Ok(out)
}

fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Full course tree. Owners see drafts; everyone else sees only published
/// content, and a draft course is reported as missing.
pub fn course_tree(conn: &Connection, course_id: &str, viewer: Option<&str>) -> ContentResult<CourseTree> {
    let Node::Course(course) = load_node(conn, NodeKind::Course, course_id)? else {
        return Err(ContentError::not_found(NodeKind::Course, course_id));
    };
    let is_owner = viewer == Some(course.user_id.as_str());
    if !is_owner && !course.is_published {
        return Err(ContentError::not_found(NodeKind::Course, course_id));
    }
    let published_only = !is_owner;
    let purchased = match viewer {
        Some(user) => has_purchased(conn, user, course_id)?,
        None => false,
    };
    let completed: HashSet<String> = match viewer {
        Some(user) => completed_chapters(conn, user, course_id)?.into_iter().collect(),
        None => HashSet::new(),
    };

    let mut chapters = Vec::new();
    for node in list_children(conn, NodeKind::Chapter, course_id, published_only)? {
        let Node::Chapter(mut chapter) = node else {
            continue;
        };
        let locked = chapter_locked(is_owner, purchased, chapter.is_free);
        let mut sections = Vec::new();
        for node in list_children(conn, NodeKind::Section, &chapter.id, published_only)? {
            let Node::Section(mut section) = node else {
                continue;
            };
            let items = list_children(conn, NodeKind::Item, &section.id, published_only)?
                .into_iter()
                .filter_map(|n| match n {
                    Node::Item(mut i) => {
                        if locked {
                            withhold(&mut i);
                        }
                        Some(i)
                    }
                    _ => None,
                })
                .collect();
            if locked {
                section.video_url = None;
            }
            sections.push(SectionTree { section, items });
        }
        if locked {
            chapter.video_url = None;
        }
        chapters.push(ChapterTree {
            completed: completed.contains(&chapter.id),
            chapter,
            locked,
            sections,
        });
    }

    let progress = match viewer {
        Some(user) if purchased || is_owner => Some(course_completion_percentage(conn, user, course_id)?),
        _ => None,
    };
    Ok(CourseTree {
        course,
        is_owner,
        purchased,
        progress,
        chapters,
    })
}

/// What one caller may see below a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectionAccess {
    pub is_owner: bool,
    /// Paid chapter the caller has not bought: item payloads are withheld.
    pub locked: bool,
}

fn chapter_locked(is_owner: bool, purchased: bool, is_free: bool) -> bool {
    !is_owner && !purchased && !is_free
}

fn withhold(item: &mut Item) {
    item.url = None;
    item.content = None;
}

/// Walks section -> chapter -> course. Non-owners get `not_found` when any
/// of the three is still a draft.
pub fn section_access(conn: &Connection, section_id: &str, viewer: Option<&str>) -> ContentResult<SectionAccess> {
    let row = conn
        .query_row(
            "SELECT s.is_published, ch.is_published, ch.is_free, c.id, c.user_id, c.is_published
             FROM sections s
             JOIN chapters ch ON ch.id = s.chapter_id
             JOIN courses c ON c.id = ch.course_id
             WHERE s.id = ?",
            [section_id],
            |r| {
                Ok((
                    r.get::<_, i64>(0)? != 0,
                    r.get::<_, i64>(1)? != 0,
                    r.get::<_, i64>(2)? != 0,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, i64>(5)? != 0,
                ))
            },
        )
        .optional()?;
    let Some((section_published, chapter_published, is_free, course_id, owner, course_published)) = row else {
        return Err(ContentError::not_found(NodeKind::Section, section_id));
    };

    if viewer == Some(owner.as_str()) {
        return Ok(SectionAccess {
            is_owner: true,
            locked: false,
        });
    }
    if !(section_published && chapter_published && course_published) {
        return Err(ContentError::not_found(NodeKind::Section, section_id));
    }
    let purchased = match viewer {
        Some(user) => has_purchased(conn, user, &course_id)?,
        None => false,
    };
    Ok(SectionAccess {
        is_owner: false,
        locked: chapter_locked(false, purchased, is_free),
    })
}

/// Leaf items of a section as `viewer` may see them.
pub fn list_section_items(conn: &Connection, section_id: &str, viewer: Option<&str>) -> ContentResult<Vec<Item>> {
    let access = section_access(conn, section_id, viewer)?;
    Ok(list_children(conn, NodeKind::Item, section_id, !access.is_owner)?
        .into_iter()
        .filter_map(|n| match n {
            Node::Item(mut i) => {
                if access.locked {
                    withhold(&mut i);
                }
                Some(i)
            }
            _ => None,
        })
        .collect())
}

/// One leaf item as `viewer` may see it. Draft items and items under a
/// draft ancestor are reported as missing to everyone but the owner.
pub fn visible_item(conn: &Connection, item_id: &str, viewer: Option<&str>) -> ContentResult<(Item, SectionAccess)> {
    let Node::Item(mut item) = load_node(conn, NodeKind::Item, item_id)? else {
        return Err(ContentError::not_found(NodeKind::Item, item_id));
    };
    let access = match section_access(conn, &item.section_id, viewer) {
        Ok(access) => access,
        Err(ContentError::NotFound { .. }) => return Err(ContentError::not_found(NodeKind::Item, item_id)),
        Err(e) => return Err(e),
    };
    if !access.is_owner && !item.is_published {
        return Err(ContentError::not_found(NodeKind::Item, item_id));
    }
    if access.locked {
        withhold(&mut item);
    }
    Ok((item, access))
}

pub fn post_tree(conn: &Connection, post_id: &str, viewer: Option<&str>) -> ContentResult<PostTree> {
    let Node::Post(post) = load_node(conn, NodeKind::Post, post_id)? else {
        return Err(ContentError::not_found(NodeKind::Post, post_id));
    };
    let is_owner = viewer == Some(post.user_id.as_str());
    if !is_owner && !post.is_published {
        return Err(ContentError::not_found(NodeKind::Post, post_id));
    }
    let chapters = list_children(conn, NodeKind::PostChapter, post_id, !is_owner)?
        .into_iter()
        .filter_map(|n| match n {
            Node::PostChapter(c) => Some(c),
            _ => None,
        })
        .collect();
    Ok(PostTree {
        post,
        is_owner,
        chapters,
    })
}

//! Course and post content trees.
//!
//! Every publishable node lives in its own table and carries `position` and
//! `is_published`. Ownership always resolves to the `user_id` of the root
//! (course or post), reached through `NodeKind::owner_expr`.

pub mod catalog;
pub mod hierarchy;
pub mod lists;
pub mod patch;
pub mod position;
pub mod progress;
pub mod publish;

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{ContentError, ContentResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Course,
    Chapter,
    Section,
    Item,
    Post,
    PostChapter,
}

impl NodeKind {
    /// Maps an IPC method family (`chapters.create` -> `chapters`) to a kind.
    pub fn from_family(family: &str) -> Option<Self> {
        match family {
            "courses" => Some(Self::Course),
            "chapters" => Some(Self::Chapter),
            "sections" => Some(Self::Section),
            "items" => Some(Self::Item),
            "posts" => Some(Self::Post),
            "postChapters" => Some(Self::PostChapter),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Chapter => "chapter",
            Self::Section => "section",
            Self::Item => "item",
            Self::Post => "post",
            Self::PostChapter => "post chapter",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Course => "courses",
            Self::Chapter => "chapters",
            Self::Section => "sections",
            Self::Item => "section_items",
            Self::Post => "posts",
            Self::PostChapter => "post_chapters",
        }
    }

    pub fn parent(self) -> Option<NodeKind> {
        match self {
            Self::Chapter => Some(Self::Course),
            Self::Section => Some(Self::Chapter),
            Self::Item => Some(Self::Section),
            Self::PostChapter => Some(Self::Post),
            Self::Course | Self::Post => None,
        }
    }

    pub fn parent_column(self) -> Option<&'static str> {
        match self {
            Self::Chapter => Some("course_id"),
            Self::Section => Some("chapter_id"),
            Self::Item => Some("section_id"),
            Self::PostChapter => Some("post_id"),
            Self::Course | Self::Post => None,
        }
    }

    /// Param key the IPC layer reads the parent id from.
    pub fn parent_param(self) -> Option<&'static str> {
        match self {
            Self::Chapter => Some("courseId"),
            Self::Section => Some("chapterId"),
            Self::Item => Some("sectionId"),
            Self::PostChapter => Some("postId"),
            Self::Course | Self::Post => None,
        }
    }

    pub fn id_param(self) -> &'static str {
        match self {
            Self::Course => "courseId",
            Self::Chapter => "chapterId",
            Self::Section => "sectionId",
            Self::Item => "itemId",
            Self::Post => "postId",
            Self::PostChapter => "postChapterId",
        }
    }

    /// Scalar SQL expression yielding the owning user id of a row of `table()`.
    pub fn owner_expr(self) -> &'static str {
        match self {
            Self::Course => "courses.user_id",
            Self::Chapter => {
                "(SELECT c.user_id FROM courses c WHERE c.id = chapters.course_id)"
            }
            Self::Section => {
                "(SELECT c.user_id FROM chapters ch JOIN courses c ON c.id = ch.course_id
                  WHERE ch.id = sections.chapter_id)"
            }
            Self::Item => {
                "(SELECT c.user_id FROM sections s
                  JOIN chapters ch ON ch.id = s.chapter_id
                  JOIN courses c ON c.id = ch.course_id
                  WHERE s.id = section_items.section_id)"
            }
            Self::Post => "posts.user_id",
            Self::PostChapter => {
                "(SELECT p.user_id FROM posts p WHERE p.id = post_chapters.post_id)"
            }
        }
    }

    fn columns(self) -> &'static str {
        match self {
            Self::Course => {
                "id, user_id, title, description, image_url, price, category_id, is_published, created_at, updated_at"
            }
            Self::Chapter => {
                "id, course_id, title, description, video_url, is_free, position, is_published, created_at, updated_at"
            }
            Self::Section => {
                "id, chapter_id, title, description, video_url, position, is_published, created_at, updated_at"
            }
            Self::Item => {
                "id, section_id, kind, title, content, url, language, position, is_published, created_at, updated_at"
            }
            Self::Post => {
                "id, user_id, title, description, image_url, category_id, is_published, created_at, updated_at"
            }
            Self::PostChapter => {
                "id, post_id, title, description, is_free, position, is_published, created_at, updated_at"
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Video,
    Blog,
    Article,
    Note,
    CodeExplanation,
}

impl ItemKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(Self::Video),
            "blog" => Some(Self::Blog),
            "article" => Some(Self::Article),
            "note" => Some(Self::Note),
            "codeExplanation" => Some(Self::CodeExplanation),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Blog => "blog",
            Self::Article => "article",
            Self::Note => "note",
            Self::CodeExplanation => "codeExplanation",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub is_free: bool,
    pub position: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub chapter_id: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub position: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub section_id: String,
    pub kind: ItemKind,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub language: Option<String>,
    pub position: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostChapter {
    pub id: String,
    pub post_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_free: bool,
    pub position: i64,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "nodeKind", rename_all = "camelCase")]
pub enum Node {
    Course(Course),
    Chapter(Chapter),
    Section(Section),
    Item(Item),
    Post(Post),
    PostChapter(PostChapter),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Course(_) => NodeKind::Course,
            Self::Chapter(_) => NodeKind::Chapter,
            Self::Section(_) => NodeKind::Section,
            Self::Item(_) => NodeKind::Item,
            Self::Post(_) => NodeKind::Post,
            Self::PostChapter(_) => NodeKind::PostChapter,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Course(n) => &n.id,
            Self::Chapter(n) => &n.id,
            Self::Section(n) => &n.id,
            Self::Item(n) => &n.id,
            Self::Post(n) => &n.id,
            Self::PostChapter(n) => &n.id,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Self::Chapter(n) => Some(&n.course_id),
            Self::Section(n) => Some(&n.chapter_id),
            Self::Item(n) => Some(&n.section_id),
            Self::PostChapter(n) => Some(&n.post_id),
            Self::Course(_) | Self::Post(_) => None,
        }
    }

    pub fn is_published(&self) -> bool {
        match self {
            Self::Course(n) => n.is_published,
            Self::Chapter(n) => n.is_published,
            Self::Section(n) => n.is_published,
            Self::Item(n) => n.is_published,
            Self::Post(n) => n.is_published,
            Self::PostChapter(n) => n.is_published,
        }
    }

    fn from_row(kind: NodeKind, r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(match kind {
            NodeKind::Course => Self::Course(Course {
                id: r.get(0)?,
                user_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                image_url: r.get(4)?,
                price: r.get(5)?,
                category_id: r.get(6)?,
                is_published: r.get::<_, i64>(7)? != 0,
                created_at: r.get(8)?,
                updated_at: r.get(9)?,
            }),
            NodeKind::Chapter => Self::Chapter(Chapter {
                id: r.get(0)?,
                course_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                video_url: r.get(4)?,
                is_free: r.get::<_, i64>(5)? != 0,
                position: r.get(6)?,
                is_published: r.get::<_, i64>(7)? != 0,
                created_at: r.get(8)?,
                updated_at: r.get(9)?,
            }),
            NodeKind::Section => Self::Section(Section {
                id: r.get(0)?,
                chapter_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                video_url: r.get(4)?,
                position: r.get(5)?,
                is_published: r.get::<_, i64>(6)? != 0,
                created_at: r.get(7)?,
                updated_at: r.get(8)?,
            }),
            NodeKind::Item => {
                let raw_kind: String = r.get(2)?;
                let kind = ItemKind::parse(&raw_kind).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown item kind: {raw_kind}").into(),
                    )
                })?;
                Self::Item(Item {
                    id: r.get(0)?,
                    section_id: r.get(1)?,
                    kind,
                    title: r.get(3)?,
                    content: r.get(4)?,
                    url: r.get(5)?,
                    language: r.get(6)?,
                    position: r.get(7)?,
                    is_published: r.get::<_, i64>(8)? != 0,
                    created_at: r.get(9)?,
                    updated_at: r.get(10)?,
                })
            }
            NodeKind::Post => Self::Post(Post {
                id: r.get(0)?,
                user_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                image_url: r.get(4)?,
                category_id: r.get(5)?,
                is_published: r.get::<_, i64>(6)? != 0,
                created_at: r.get(7)?,
                updated_at: r.get(8)?,
            }),
            NodeKind::PostChapter => Self::PostChapter(PostChapter {
                id: r.get(0)?,
                post_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                is_free: r.get::<_, i64>(4)? != 0,
                position: r.get(5)?,
                is_published: r.get::<_, i64>(6)? != 0,
                created_at: r.get(7)?,
                updated_at: r.get(8)?,
            }),
        })
    }
}

pub fn find_node(conn: &Connection, kind: NodeKind, id: &str) -> ContentResult<Option<Node>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        kind.columns(),
        kind.table()
    );
    Ok(conn
        .query_row(&sql, [id], |r| Node::from_row(kind, r))
        .optional()?)
}

pub fn load_node(conn: &Connection, kind: NodeKind, id: &str) -> ContentResult<Node> {
    find_node(conn, kind, id)?.ok_or_else(|| ContentError::not_found(kind, id))
}

/// Children of `parent_id`, in sibling order.
pub fn list_children(
    conn: &Connection,
    kind: NodeKind,
    parent_id: &str,
    published_only: bool,
) -> ContentResult<Vec<Node>> {
    let Some(parent_col) = kind.parent_column() else {
        return Err(ContentError::invalid(format!(
            "{} has no parent",
            kind.label()
        )));
    };
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?{} ORDER BY position, id",
        kind.columns(),
        kind.table(),
        parent_col,
        if published_only {
            " AND is_published = 1"
        } else {
            ""
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([parent_id], |r| Node::from_row(kind, r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Owning user of a node, or `NotFound` when the node does not exist.
pub fn owner_of(conn: &Connection, kind: NodeKind, id: &str) -> ContentResult<String> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        kind.owner_expr(),
        kind.table()
    );
    conn.query_row(&sql, [id], |r| r.get::<_, String>(0))
        .optional()?
        .ok_or_else(|| ContentError::not_found(kind, id))
}

pub fn ensure_owner(conn: &Connection, kind: NodeKind, id: &str, user_id: &str) -> ContentResult<()> {
    if owner_of(conn, kind, id)? != user_id {
        return Err(ContentError::forbidden(kind, id));
    }
    Ok(())
}

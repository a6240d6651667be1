use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "coursed.sqlite3";

pub fn open_db(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(busy_timeout)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates every table and index. Safe to run against an existing workspace.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            price REAL,
            category_id TEXT,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_user ON courses(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_category ON courses(category_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS chapters(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            video_url TEXT,
            is_free INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE,
            UNIQUE(course_id, position)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            chapter_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            video_url TEXT,
            position INTEGER NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(chapter_id) REFERENCES chapters(id) ON DELETE CASCADE,
            UNIQUE(chapter_id, position)
        )",
        [],
    )?;

    // Leaf positions are allocated like everything else but not constrained.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS section_items(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT,
            url TEXT,
            language TEXT,
            position INTEGER NOT NULL DEFAULT 0,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(section_id) REFERENCES sections(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_section_items_section ON section_items(section_id, position)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS posts(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            category_id TEXT,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS post_chapters(
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            is_free INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(post_id) REFERENCES posts(id) ON DELETE CASCADE,
            UNIQUE(post_id, position)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS favorite_videos(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            video_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(video_id) REFERENCES section_items(id) ON DELETE CASCADE,
            UNIQUE(user_id, video_id),
            UNIQUE(user_id, position)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profile_links(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            label TEXT NOT NULL,
            url TEXT NOT NULL,
            position INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, position)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS purchases(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE,
            UNIQUE(user_id, course_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_progress(
            user_id TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            section_id TEXT,
            is_completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(user_id, chapter_id),
            FOREIGN KEY(chapter_id) REFERENCES chapters(id) ON DELETE CASCADE,
            FOREIGN KEY(section_id) REFERENCES sections(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_progress_chapter ON user_progress(chapter_id)",
        [],
    )?;

    Ok(())
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .expect("prepare");
        stmt.query_map([], |r| r.get::<_, String>(0))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect")
    }

    #[test]
    fn schema_init_is_repeatable() {
        let conn = open_in_memory();
        init_schema(&conn).expect("second init");
        let names = table_names(&conn);
        for t in [
            "categories",
            "chapters",
            "courses",
            "favorite_videos",
            "post_chapters",
            "posts",
            "profile_links",
            "purchases",
            "section_items",
            "sections",
            "user_progress",
        ] {
            assert!(names.iter().any(|n| n == t), "missing table {t}");
        }
    }

    #[test]
    fn workspace_db_is_created_on_open() {
        let dir = std::env::temp_dir().join(format!("coursed-db-{}", uuid::Uuid::new_v4()));
        let conn = open_db(&dir, Duration::from_millis(500)).expect("open db");
        drop(conn);
        assert!(dir.join(DB_FILE_NAME).is_file());
        let _ = std::fs::remove_dir_all(dir);
    }
}

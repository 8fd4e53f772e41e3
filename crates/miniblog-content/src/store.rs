use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDateTime, Timelike, Utc};
use miniblog_protocol::timestamp;
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use crate::error::{ContentError, Result};
use crate::types::{Comment, NewPost, Post};

/// Thread-safe store for posts and comments over one SQLite connection.
pub struct ContentStore {
    db: Mutex<Connection>,
}

impl ContentStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // poisoning leaves the connection usable
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[instrument(skip(self, post), fields(title = %post.title))]
    pub fn create_post(&self, post: &NewPost) -> Result<Post> {
        post.validate()?;
        let ts = truncate(post.timestamp);
        let db = self.conn();
        db.execute(
            "INSERT INTO posts (title, description, timestamp, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![post.title, post.description, timestamp::format(&ts), post.status],
        )?;
        let id = db.last_insert_rowid();
        debug!(post_id = id, "post created");
        Ok(Post {
            id,
            title: post.title.clone(),
            description: post.description.clone(),
            timestamp: ts,
            status: post.status.clone(),
        })
    }

    #[instrument(skip(self))]
    pub fn get_post(&self, id: i64) -> Result<Post> {
        let db = self.conn();
        match db.query_row(
            "SELECT id, title, description, timestamp, status FROM posts WHERE id = ?1",
            params![id],
            row_to_post,
        ) {
            Ok(p) => Ok(p),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(ContentError::PostNotFound { id }),
            Err(e) => Err(ContentError::Database(e)),
        }
    }

    /// All posts, newest timestamp first.
    #[instrument(skip(self))]
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT id, title, description, timestamp, status
             FROM posts
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([], row_to_post)?;
        let posts = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = posts.len(), "listed posts");
        Ok(posts)
    }

    /// Replace every author-editable field of a post.
    #[instrument(skip(self, post))]
    pub fn update_post(&self, id: i64, post: &NewPost) -> Result<Post> {
        post.validate()?;
        let ts = truncate(post.timestamp);
        let db = self.conn();
        let rows_changed = db.execute(
            "UPDATE posts
             SET title = ?1, description = ?2, timestamp = ?3, status = ?4
             WHERE id = ?5",
            params![post.title, post.description, timestamp::format(&ts), post.status, id],
        )?;
        if rows_changed == 0 {
            return Err(ContentError::PostNotFound { id });
        }
        Ok(Post {
            id,
            title: post.title.clone(),
            description: post.description.clone(),
            timestamp: ts,
            status: post.status.clone(),
        })
    }

    /// Delete a post and, through the foreign key, its comments.
    #[instrument(skip(self))]
    pub fn delete_post(&self, id: i64) -> Result<()> {
        let db = self.conn();
        let rows_changed = db.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if rows_changed == 0 {
            return Err(ContentError::PostNotFound { id });
        }
        Ok(())
    }

    /// Attach a comment to an existing post, stamped with the current time.
    #[instrument(skip(self, content))]
    pub fn add_comment(&self, post_id: i64, user: &str, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(ContentError::Invalid("content must not be empty".to_string()));
        }
        let ts = truncate(Utc::now().naive_utc());
        let db = self.conn();
        let exists: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(ContentError::PostNotFound { id: post_id });
        }
        db.execute(
            "INSERT INTO comments (post_id, user, content, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![post_id, user, content, timestamp::format(&ts)],
        )?;
        Ok(Comment {
            id: db.last_insert_rowid(),
            post_id,
            user: user.to_string(),
            content: content.to_string(),
            timestamp: ts,
        })
    }

    /// Comments on a post, newest first. Unknown posts simply have none.
    #[instrument(skip(self))]
    pub fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT id, post_id, user, content, timestamp
             FROM comments
             WHERE post_id = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![post_id], row_to_comment)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// Wire timestamps carry whole seconds only; store exactly what clients see.
fn truncate(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<NaiveDateTime> {
    timestamp::parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        timestamp: parse_ts(3, row.get(3)?)?,
        status: row.get(4)?,
    })
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user: row.get(2)?,
        content: row.get(3)?,
        timestamp: parse_ts(4, row.get(4)?)?,
    })
}

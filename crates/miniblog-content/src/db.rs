use rusqlite::Connection;

use crate::error::Result;

/// Initialise the posts and comments tables.
///
/// Safe to call on every startup (uses `IF NOT EXISTS` throughout).
/// Comments are removed with their post, which needs `PRAGMA foreign_keys=ON`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            status      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS comments (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id   INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user      TEXT NOT NULL,
            content   TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, timestamp DESC);",
    )?;
    Ok(())
}

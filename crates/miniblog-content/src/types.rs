use chrono::NaiveDateTime;
use miniblog_protocol::PostPayload;
use serde::{Deserialize, Serialize};

use crate::error::{ContentError, Result};

/// A persisted blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Author-chosen publication time, second precision.
    #[serde(with = "miniblog_protocol::timestamp")]
    pub timestamp: NaiveDateTime,
    /// Free-form workflow label, e.g. `"Ongoing"`.
    pub status: String,
}

impl From<&Post> for PostPayload {
    fn from(post: &Post) -> Self {
        PostPayload {
            id: post.id,
            title: post.title.clone(),
            description: post.description.clone(),
            timestamp: post.timestamp,
            status: post.status.clone(),
        }
    }
}

/// Fields an author submits when creating or replacing a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    #[serde(with = "miniblog_protocol::timestamp")]
    pub timestamp: NaiveDateTime,
    pub status: String,
}

impl NewPost {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ContentError::Invalid("title must not be empty".to_string()));
        }
        if self.status.trim().is_empty() {
            return Err(ContentError::Invalid("status must not be empty".to_string()));
        }
        Ok(())
    }
}

/// A reader comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user: String,
    pub content: String,
    #[serde(with = "miniblog_protocol::timestamp")]
    pub timestamp: NaiveDateTime,
}

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{EventError, Result};

/// Titles in post-save notices are cut to this many characters.
const NOTICE_TITLE_CHARS: usize = 30;

/// Snapshot of a post as clients render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPayload {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(with = "crate::timestamp")]
    pub timestamp: NaiveDateTime,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentPayload {
    pub post_id: i64,
    pub user: String,
    pub content: String,
    #[serde(with = "crate::timestamp")]
    pub timestamp: NaiveDateTime,
}

/// Server → client live update.
///
/// Wire: `{ "type": "blog_post_update", "id": 1, "title": "...", ... }`.
/// Build through the constructors, which reject events missing a value the
/// client needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    #[serde(rename = "blog_post_update")]
    PostCreated(PostPayload),
    #[serde(rename = "blog_post_edit")]
    PostUpdated(PostPayload),
    #[serde(rename = "blog_delete_post")]
    PostDeleted { id: i64 },
    #[serde(rename = "new_comment")]
    CommentAdded(CommentPayload),
    #[serde(rename = "notification")]
    Notice { message: String },
}

impl DomainEvent {
    pub fn post_created(post: PostPayload) -> Result<Self> {
        Self::PostCreated(post).validated()
    }

    pub fn post_updated(post: PostPayload) -> Result<Self> {
        Self::PostUpdated(post).validated()
    }

    pub fn post_deleted(id: i64) -> Self {
        Self::PostDeleted { id }
    }

    pub fn comment_added(
        post_id: i64,
        user: impl Into<String>,
        content: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Result<Self> {
        Self::CommentAdded(CommentPayload {
            post_id,
            user: user.into(),
            content: content.into(),
            timestamp,
        })
        .validated()
    }

    pub fn notice(message: impl Into<String>) -> Result<Self> {
        Self::Notice {
            message: message.into(),
        }
        .validated()
    }

    /// Check every value a client needs is present.
    ///
    /// The constructors call this; the dispatcher checks again before
    /// encoding, so a hand-built variant cannot reach the wire half-filled.
    pub fn validate(&self) -> Result<()> {
        match self {
            DomainEvent::PostCreated(post) | DomainEvent::PostUpdated(post) => {
                require(self.event_type(), "title", &post.title)?;
                require(self.event_type(), "status", &post.status)
            }
            DomainEvent::PostDeleted { .. } => Ok(()),
            DomainEvent::CommentAdded(comment) => {
                require("new_comment", "user", &comment.user)?;
                require("new_comment", "content", &comment.content)
            }
            DomainEvent::Notice { message } => require("notification", "message", message),
        }
    }

    fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// The wire `type` discriminator.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::PostCreated(_) => "blog_post_update",
            DomainEvent::PostUpdated(_) => "blog_post_edit",
            DomainEvent::PostDeleted { .. } => "blog_delete_post",
            DomainEvent::CommentAdded(_) => "new_comment",
            DomainEvent::Notice { .. } => "notification",
        }
    }
}

fn require(event: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EventError::MissingField { event, field });
    }
    Ok(())
}

/// Human-readable notice sent alongside a post save.
///
/// `New post created: <title>` or `Post updated: <title>`, with titles over
/// 30 characters cut and suffixed with `...`.
pub fn post_saved_notice(created: bool, title: &str) -> String {
    let mut short: String = title.chars().take(NOTICE_TITLE_CHARS).collect();
    if title.chars().count() > NOTICE_TITLE_CHARS {
        short.push_str("...");
    }
    if created {
        format!("New post created: {short}")
    } else {
        format!("Post updated: {short}")
    }
}

//! Comments: `/api/posts/{id}/comments`.
//!
//! The commenter is whichever author the bearer token resolves to.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use miniblog_content::Comment;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::{authenticate, content_failure, ApiFailure};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// GET /api/posts/{id}/comments: newest first.
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiFailure> {
    state
        .store
        .comments_for_post(post_id)
        .map(Json)
        .map_err(content_failure)
}

/// POST /api/posts/{id}/comments
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiFailure> {
    let author = authenticate(&state, &headers)?;
    let comment = state
        .store
        .add_comment(post_id, &author, &req.content)
        .map_err(content_failure)?;
    info!(post_id, comment_id = comment.id, author = %author, "comment added");

    let broadcast = comment.clone();
    tokio::spawn(async move {
        if let Err(e) = state
            .live
            .dispatcher()
            .notify_comment_added(post_id, &broadcast.user, &broadcast.content, broadcast.timestamp)
            .await
        {
            warn!(post_id, error = %e, "comment event not broadcast");
        }
    });
    Ok((StatusCode::CREATED, Json(comment)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use miniblog_core::config::AuthMode;
    use serde_json::{json, Value};

    use crate::app::testing::{self, ALICE_TOKEN};

    async fn seed_post(router: axum::Router) -> Value {
        let (_, post) = testing::send(
            router,
            "POST",
            "/api/posts",
            Some(ALICE_TOKEN),
            Some(json!({
                "title": "Hi",
                "description": "d",
                "timestamp": "2024-01-01 00:00:00",
                "status": "Ongoing",
            })),
        )
        .await;
        post
    }

    #[tokio::test]
    async fn comment_is_stored_and_broadcast_as_author() {
        let state = testing::state(AuthMode::Token);
        let router = testing::router(&state);
        let post = seed_post(router.clone()).await;

        let (session, mut outbound) = state.live.session();
        session.open().await.unwrap();

        let uri = format!("/api/posts/{}/comments", post["id"]);
        let (status, comment) = testing::send(
            router.clone(),
            "POST",
            &uri,
            Some(ALICE_TOKEN),
            Some(json!({"content": "nice"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["user"], "alice");

        let frame = outbound.recv().await.unwrap();
        let event: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            event,
            json!({
                "type": "new_comment",
                "post_id": post["id"],
                "user": "alice",
                "content": "nice",
                "timestamp": comment["timestamp"],
            })
        );

        let (status, listed) = testing::send(router, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_content_is_bad_request() {
        let state = testing::state(AuthMode::Token);
        let router = testing::router(&state);
        let post = seed_post(router.clone()).await;

        let uri = format!("/api/posts/{}/comments", post["id"]);
        let (status, _) = testing::send(
            router,
            "POST",
            &uri,
            Some(ALICE_TOKEN),
            Some(json!({"content": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn comment_on_unknown_post_is_not_found() {
        let state = testing::state(AuthMode::Token);
        let (status, _) = testing::send(
            testing::router(&state),
            "POST",
            "/api/posts/404/comments",
            Some(ALICE_TOKEN),
            Some(json!({"content": "hello?"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_post_lists_no_comments() {
        let state = testing::state(AuthMode::Token);
        let (status, listed) = testing::send(
            testing::router(&state),
            "GET",
            "/api/posts/404/comments",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([]));
    }
}

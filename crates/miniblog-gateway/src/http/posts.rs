//! Post CRUD: `/api/posts` and `/api/posts/{id}`.
//!
//! Create: `{"title", "description", "timestamp": "YYYY-MM-DD HH:MM:SS", "status"}`
//! → 201 with the stored post. Update takes the same body.
//!
//! Live updates are published from a spawned task once the store call has
//! returned, so a slow group backend never holds up the response.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use miniblog_content::{NewPost, Post};
use miniblog_protocol::{events::post_saved_notice, PostPayload};
use std::sync::Arc;
use tracing::{info, warn};

use super::{authenticate, content_failure, ApiFailure};
use crate::app::AppState;

/// GET /api/posts: newest first.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Post>>, ApiFailure> {
    state.store.list_posts().map(Json).map_err(content_failure)
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiFailure> {
    state.store.get_post(id).map(Json).map_err(content_failure)
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiFailure> {
    let author = authenticate(&state, &headers)?;
    let post = state.store.create_post(&req).map_err(content_failure)?;
    info!(post_id = post.id, author = %author, "post created");

    tokio::spawn(announce_saved(Arc::clone(&state), post.clone(), true));
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/posts/{id}: replaces every editable field.
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<NewPost>,
) -> Result<Json<Post>, ApiFailure> {
    let author = authenticate(&state, &headers)?;
    let post = state.store.update_post(id, &req).map_err(content_failure)?;
    info!(post_id = id, author = %author, "post updated");

    tokio::spawn(announce_saved(Arc::clone(&state), post.clone(), false));
    Ok(Json(post))
}

/// DELETE /api/posts/{id}: 204; comments go with the post.
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiFailure> {
    let author = authenticate(&state, &headers)?;
    state.store.delete_post(id).map_err(content_failure)?;
    info!(post_id = id, author = %author, "post deleted");

    tokio::spawn(async move { state.live.dispatcher().notify_post_deleted(id).await });
    Ok(StatusCode::NO_CONTENT)
}

/// Broadcast the post event followed by its human-readable notice.
/// Runs off the request path; both events go out in this order.
async fn announce_saved(state: Arc<AppState>, post: Post, created: bool) {
    let dispatcher = state.live.dispatcher();
    let payload = PostPayload::from(&post);
    let sent = if created {
        dispatcher.notify_post_created(payload).await
    } else {
        dispatcher.notify_post_updated(payload).await
    };
    if let Err(e) = sent {
        warn!(post_id = post.id, error = %e, "post event not broadcast");
    }

    if let Err(e) = dispatcher
        .notify_generic(post_saved_notice(created, &post.title))
        .await
    {
        warn!(post_id = post.id, error = %e, "post notice not broadcast");
    }
}

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use miniblog_content::ContentStore;
use miniblog_core::MiniblogConfig;
use miniblog_live::LiveHub;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: MiniblogConfig,
    pub store: ContentStore,
    /// Live-update fan-out: sessions for `/ws`, dispatcher for mutations.
    pub live: LiveHub,
}

impl AppState {
    pub fn new(config: MiniblogConfig, store: ContentStore, live: LiveHub) -> Self {
        Self {
            config,
            store,
            live,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use crate::http::{comments, health, notifications, posts};

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/api/posts/{id}/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/api/notifications", post(notifications::broadcast_notice))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

//! Operator notices: POST /api/notifications
//!
//! Request:  `{"message": "Maintenance at noon"}`
//! Response: `{"recipients": 3}` (subscribers whose queue accepted it)

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use miniblog_protocol::DomainEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{api_error, authenticate, ApiFailure};
use crate::app::AppState;

#[derive(Deserialize)]
pub struct NoticeRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct NoticeResponse {
    pub recipients: usize,
}

/// POST /api/notifications: broadcast a `notification` event.
pub async fn broadcast_notice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NoticeRequest>,
) -> Result<Json<NoticeResponse>, ApiFailure> {
    let author = authenticate(&state, &headers)?;
    let event = DomainEvent::Notice {
        message: req.message,
    };
    let report = state
        .live
        .dispatcher()
        .emit(&event)
        .await
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "message cannot be empty"))?;
    info!(author = %author, recipients = report.delivered, "notice broadcast");
    Ok(Json(NoticeResponse {
        recipients: report.delivered,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use miniblog_core::config::AuthMode;
    use serde_json::json;

    use crate::app::testing::{self, ALICE_TOKEN};

    #[tokio::test]
    async fn notice_reaches_open_sessions() {
        let state = testing::state(AuthMode::Token);
        let (a, mut rx_a) = state.live.session();
        let (b, mut rx_b) = state.live.session();
        a.open().await.unwrap();
        b.open().await.unwrap();

        let (status, body) = testing::send(
            testing::router(&state),
            "POST",
            "/api/notifications",
            Some(ALICE_TOKEN),
            Some(json!({"message": "Maintenance at noon"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipients"], 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                &*rx.recv().await.unwrap(),
                r#"{"type":"notification","message":"Maintenance at noon"}"#
            );
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let state = testing::state(AuthMode::None);
        let (status, _) = testing::send(
            testing::router(&state),
            "POST",
            "/api/notifications",
            None,
            Some(json!({"message": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.live.dispatcher().stats().published, 0);
    }

    #[tokio::test]
    async fn requires_token() {
        let state = testing::state(AuthMode::Token);
        let (status, _) = testing::send(
            testing::router(&state),
            "POST",
            "/api/notifications",
            Some("wrong"),
            Some(json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

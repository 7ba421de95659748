//! Administrative prompt cache endpoints

use crate::cache::CacheStats;
use crate::domain::EngineId;
use crate::gateway::GatewayState;
use crate::infrastructure::log_messages::gateway as log_msg;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedEntry {
    pub engine_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearedAll {
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminError {
    pub code: String,
    pub message: String,
}

pub async fn cache_stats(State(state): State<GatewayState>) -> Json<CacheStats> {
    Json(state.relay.cache().stats())
}

pub async fn clear_cache_entry(
    State(state): State<GatewayState>,
    Path(engine_id): Path<String>,
) -> Response {
    match EngineId::try_new(engine_id) {
        Ok(engine_id) => {
            let removed = state.relay.cache().clear(&engine_id);
            info!(engine_id = %engine_id, removed, "{}", log_msg::CACHE_CLEARED);
            Json(ClearedEntry {
                engine_id: engine_id.to_string(),
                removed,
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(AdminError {
                code: "INVALID_ENGINE_ID".to_string(),
                message: e.to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn clear_cache(State(state): State<GatewayState>) -> Json<ClearedAll> {
    let cleared = state.relay.cache().clear_all();
    info!(cleared, "{}", log_msg::CACHE_CLEARED);
    Json(ClearedAll { cleared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::test_state;
    use crate::gateway::{paths, router};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    async fn call(
        state: GatewayState,
        method: Method,
        uri: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn warm(state: &GatewayState, ids: &[&str]) {
        for id in ids {
            state
                .relay
                .cache()
                .get(&EngineId::try_new(id.to_string()).unwrap())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_stats_list_cached_engines() {
        let state = test_state();
        warm(&state, &["T6", "T5"]).await;

        let (status, body) = call(state, Method::GET, paths::ADMIN_CACHE).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry_count"], 2);
        assert_eq!(body["engine_ids"], serde_json::json!(["T5", "T6"]));
    }

    #[tokio::test]
    async fn test_clear_one_entry() {
        let state = test_state();
        warm(&state, &["T5", "T6"]).await;

        let (status, body) = call(state.clone(), Method::DELETE, "/admin/cache/T5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], true);
        assert_eq!(state.relay.cache().stats().entry_count, 1);
    }

    #[tokio::test]
    async fn test_clear_absent_entry_is_a_no_op() {
        let (status, body) = call(test_state(), Method::DELETE, "/admin/cache/T9").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], false);
    }

    #[tokio::test]
    async fn test_invalid_engine_id_is_rejected() {
        let (status, body) = call(test_state(), Method::DELETE, "/admin/cache/%20").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ENGINE_ID");
    }

    #[tokio::test]
    async fn test_clear_all() {
        let state = test_state();
        warm(&state, &["T5", "T6"]).await;

        let (status, body) = call(state.clone(), Method::DELETE, paths::ADMIN_CACHE).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 2);
        assert_eq!(state.relay.cache().stats().entry_count, 0);
    }
}

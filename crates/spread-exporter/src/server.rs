use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::exposition;
use crate::store::MetricsStore;

#[derive(Clone)]
pub struct AppState {
    pub store: MetricsStore,
}

impl AppState {
    pub fn new(store: MetricsStore) -> Self {
        Self { store }
    }
}

/// 저장소 스냅샷을 Prometheus 텍스트 포맷으로 반환. 비어 있어도 200
async fn metrics_handler(State(state): State<Arc<AppState>>) -> axum::response::Response {
    let snapshot = state.store.snapshot().await;
    match exposition::render(&snapshot) {
        Ok(rendered) => (
            [(header::CONTENT_TYPE, rendered.content_type)],
            rendered.body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 이미 바인딩된 listener 로 서빙. `shutdown` 이 취소되면 graceful 하게 종료
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("http server stopped");
    Ok(())
}

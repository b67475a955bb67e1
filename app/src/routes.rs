use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{info, warn};

use sondeo::{RunRequest, SupervisorError};

use crate::dashboard;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StartRequest {
    #[serde(alias = "tema")]
    topic: String,
    items_per_topic: Option<u32>,
}

#[derive(Deserialize)]
pub struct LogsQuery {
    since: Option<u64>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start", post(start))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .route("/results", get(results))
        .route("/dashboard", get(dashboard_page))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(dashboard::INDEX_HTML)
}

async fn start(State(state): State<Arc<AppState>>, Json(body): Json<StartRequest>) -> Response {
    let mut request = RunRequest::from_topic_list(&body.topic);
    if let Some(items) = body.items_per_topic {
        request = request.with_items(items);
    }

    match state.supervisor.start(request) {
        Ok((topic, _handle)) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"success": true, "topic": topic})),
        )
            .into_response(),
        Err(e) => {
            let code = match e {
                SupervisorError::EmptyTopic => StatusCode::BAD_REQUEST,
                SupervisorError::AlreadyRunning { .. } => StatusCode::CONFLICT,
            };
            warn!("Rejected start request: {}", e);
            (
                code,
                Json(serde_json::json!({"success": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.supervisor.status())
}

async fn logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> impl IntoResponse {
    let entries = state.supervisor.logs_since(params.since.unwrap_or(0));
    let last_seq = entries.last().map(|e| e.seq).or(params.since).unwrap_or(0);
    Json(serde_json::json!({"entries": entries, "last_seq": last_seq}))
}

async fn results(State(state): State<Arc<AppState>>) -> Response {
    match state.aggregator.aggregate(state.interpreter.as_ref()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!("Aggregation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

async fn dashboard_page(State(state): State<Arc<AppState>>) -> Response {
    if !state.supervisor.is_done() {
        info!("Dashboard requested before the run is done, redirecting");
        return Redirect::to("/").into_response();
    }
    match state.aggregator.aggregate(state.interpreter.as_ref()).await {
        Ok(report) => Html(dashboard::render(&report, &state.supervisor.status())).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

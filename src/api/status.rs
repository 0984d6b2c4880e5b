//! Status endpoint

use axum::{Json, extract::State as AxumState, response::IntoResponse};
use serde_json::json;

use crate::SharedState;

/// Returns service identity and what it is watching. Never exposes the secret.
pub async fn status(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let config = &state.config;
    Json(json!({
        "server": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "watching": {
            "remote": config.git_remote,
            "branch": config.git_branch,
            "docs_dir": config.docs_dir,
        }
    }))
}

//! Webhook related structures: header extraction, event routing and outcomes

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::UpdateError;
use crate::updater::UpdateReport;

pub const PUSH_EVENT: &str = "push";

const SIGNATURE_HEADERS: [(&str, Option<&str>); 2] = [
    ("X-Gitea-Signature", None),
    ("X-Hub-Signature-256", Some("sha256=")),
];
const EVENT_HEADERS: [&str; 2] = ["X-Gitea-Event", "X-GitHub-Event"];
const DELIVERY_HEADERS: [&str; 2] = ["X-Gitea-Delivery", "X-GitHub-Delivery"];

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Signature token as presented by the sender. Gitea sends the bare hex
/// digest; GitHub's `sha256=` prefix is stripped.
pub fn signature_token(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS.iter().find_map(|(name, prefix)| {
        let value = header(headers, name)?;
        match prefix {
            Some(prefix) => Some(value.strip_prefix(prefix).unwrap_or(value)),
            None => Some(value),
        }
    })
}

pub fn event_type(headers: &HeaderMap) -> Option<&str> {
    EVENT_HEADERS.iter().find_map(|name| header(headers, name))
}

pub fn delivery_id(headers: &HeaderMap) -> Option<&str> {
    DELIVERY_HEADERS.iter().find_map(|name| header(headers, name))
}

/// Last `/` segment of a ref: `refs/heads/main` -> `main`.
pub fn branch_from_ref(git_ref: &str) -> &str {
    git_ref.rsplit('/').next().unwrap_or(git_ref)
}

/// What to do with an authenticated, parsed notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    IgnoreEvent(String),
    IgnoreBranch(String),
    Update { branch: String },
}

/// Decides whether a notification should trigger the update action.
pub fn route(
    event: Option<&str>,
    payload: &Value,
    target_branch: &str,
) -> Result<Route, WebhookRejection> {
    if event != Some(PUSH_EVENT) {
        return Ok(Route::IgnoreEvent(event.unwrap_or_default().to_string()));
    }

    let git_ref = payload
        .get("ref")
        .and_then(Value::as_str)
        .ok_or(WebhookRejection::MissingRef)?;

    let branch = branch_from_ref(git_ref);
    if branch != target_branch {
        return Ok(Route::IgnoreBranch(branch.to_string()));
    }

    Ok(Route::Update {
        branch: branch.to_string(),
    })
}

/// Successful (200) webhook outcomes
#[derive(Debug)]
pub enum WebhookOutcome {
    IgnoredEvent(String),
    IgnoredBranch(String),
    Updated(UpdateReport),
}

impl IntoResponse for WebhookOutcome {
    fn into_response(self) -> Response {
        let message = match self {
            WebhookOutcome::IgnoredEvent(event) => format!("Event type '{}' ignored", event),
            WebhookOutcome::IgnoredBranch(branch) => {
                format!("Ignored event for branch '{}'", branch)
            }
            WebhookOutcome::Updated(_) => "Docs updated".to_string(),
        };
        (StatusCode::OK, message).into_response()
    }
}

/// Terminal request failures
#[derive(Debug, thiserror::Error)]
pub enum WebhookRejection {
    #[error("Signature required")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid JSON payload")]
    InvalidJson,

    #[error("Push payload has no string 'ref' field")]
    MissingRef,

    #[error("Failed to update docs")]
    UpdateFailed(#[source] UpdateError),
}

impl WebhookRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookRejection::MissingSignature | WebhookRejection::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            WebhookRejection::InvalidJson | WebhookRejection::MissingRef => StatusCode::BAD_REQUEST,
            WebhookRejection::UpdateFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

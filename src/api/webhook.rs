//! Webhook handler for push events

use axum::{body::Bytes, extract::State as AxumState, http::HeaderMap};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::SharedState;
use crate::error::UpdateError;
use crate::signature::verify_signature;
use crate::updater::UpdateReport;
use crate::webhook::{
    Route, WebhookOutcome, WebhookRejection, delivery_id, event_type, route, signature_token,
};

/// Handles the webhook POST request.
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what was sent. Qualifying pushes run the update before responding.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<WebhookOutcome, WebhookRejection> {
    let delivery = delivery_id(&headers).unwrap_or("-");
    info!("Received webhook request (delivery {})", delivery);

    let Some(signature) = signature_token(&headers) else {
        warn!("Webhook request without a signature header (delivery {})", delivery);
        return Err(WebhookRejection::MissingSignature);
    };

    if !verify_signature(&state.config.secret, &body, signature) {
        warn!("Invalid webhook signature (delivery {})", delivery);
        return Err(WebhookRejection::InvalidSignature);
    }
    info!("Webhook signature verified");

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        error!("Could not parse webhook JSON payload: {}", e);
        WebhookRejection::InvalidJson
    })?;

    let event = event_type(&headers);
    info!("Webhook event type: {:?}", event);

    let branch = match route(event, &payload, &state.config.git_branch)? {
        Route::IgnoreEvent(event) => {
            info!("Event type '{}' ignored", event);
            return Ok(WebhookOutcome::IgnoredEvent(event));
        }
        Route::IgnoreBranch(branch) => {
            info!(
                "Push event for branch '{}', but only listening on '{}'. Ignoring.",
                branch, state.config.git_branch
            );
            return Ok(WebhookOutcome::IgnoredBranch(branch));
        }
        Route::Update { branch } => branch,
    };

    info!("Push event for branch '{}', starting update", branch);

    // The update runs on its own task so a sender hanging up mid-pull does
    // not cancel it. The response still waits for the outcome.
    let worker = tokio::spawn(run_update(state.clone()));
    let outcome = worker.await.unwrap_or_else(|join_error| {
        Err(UpdateError::WorkerAborted {
            message: join_error.to_string(),
        })
    });

    match outcome {
        Ok(report) => {
            info!("Update {} for branch '{}' succeeded", report.id, branch);
            Ok(WebhookOutcome::Updated(report))
        }
        Err(e) => {
            error!("Update for branch '{}' failed: {}", branch, e);
            Err(WebhookRejection::UpdateFailed(e))
        }
    }
}

/// Waits (bounded) for the update lock, then runs the update once.
async fn run_update(state: SharedState) -> Result<UpdateReport, UpdateError> {
    // Only one update touches the working copy at a time.
    let lock_wait = state.config.lock_wait;
    let _guard = timeout(lock_wait, state.update_lock.lock())
        .await
        .map_err(|_| UpdateError::LockWaitExpired { waited: lock_wait })?;

    state.updater.update().await
}

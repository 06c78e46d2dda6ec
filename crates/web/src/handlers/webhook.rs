use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_core::{
    AppError,
    models::{InstallationRepo, RunKey, RunOutcome},
};
use courier_github::webhook::GitHubEvent;
use courier_jobs::{
    CompletedRunJob, JobContext,
    tracker::{Completed, Requested},
};
use octocrab::models::webhook_events::{
    EventInstallation, WebhookEventPayload,
    payload::{
        InstallationRepositoriesWebhookEventAction, InstallationWebhookEventAction,
        WorkflowRunWebhookEventAction,
    },
};
use serde::Deserialize;

use crate::AppState;

/// The subset of a `workflow_run` payload this service acts on. The full
/// object is large and mostly irrelevant, so it stays a raw value until here.
#[derive(Debug, Deserialize)]
struct RunInfo {
    id: u64,
    name: String,
    #[serde(default = "default_attempt")]
    run_attempt: u64,
    conclusion: Option<String>,
}

fn default_attempt() -> u64 { 1 }

/// Webhook handler. Signature verification and delivery dedup already
/// happened in the extractor; anything handed to a background task is spawned
/// so the delivery is acknowledged immediately.
pub async fn webhook(
    State(state): State<AppState>,
    GitHubEvent { delivery_id, event }: GitHubEvent,
) -> Result<Response, AppError> {
    // Log the event source
    let mut owner = None;
    let mut repo = None;
    if let Some(repository) = &event.repository {
        owner = repository.owner.as_ref().map(|o| o.login.clone());
        repo = Some(repository.name.clone());
        tracing::info!(
            "Received {:?} event {} from repository {}",
            event.kind,
            delivery_id,
            repository.full_name.as_deref().unwrap_or(&repository.name)
        );
    } else if let Some(sender) = &event.sender {
        tracing::info!("Received {:?} event {} from @{}", event.kind, delivery_id, sender.login);
    } else {
        tracing::info!("Received {:?} event {} from unknown source", event.kind, delivery_id);
    }

    let installation_id = match &event.installation {
        Some(EventInstallation::Full(installation)) => {
            owner = Some(installation.account.login.clone());
            Some(installation.id.into_inner())
        }
        Some(EventInstallation::Minimal(installation)) => Some(installation.id.into_inner()),
        None => None,
    };

    match &event.specific {
        WebhookEventPayload::WorkflowRun(inner) => {
            let run: RunInfo = match serde_json::from_value(inner.workflow_run.clone()) {
                Ok(run) => run,
                Err(e) => {
                    tracing::error!("Received workflow_run event with invalid workflow_run: {e}");
                    return Ok((StatusCode::OK, "Invalid workflow run").into_response());
                }
            };
            let (Some(owner), Some(repo)) = (owner, repo) else {
                tracing::warn!("Received workflow_run event with no repository");
                return Ok((StatusCode::OK, "No repository").into_response());
            };
            let key = RunKey::new(owner, repo, run.id);
            match inner.action {
                WorkflowRunWebhookEventAction::Requested => {
                    match state.tracker.note_requested(key.clone(), run.run_attempt, &run.name).await
                    {
                        Requested::Tracked => tracing::info!("Tracking run {key}"),
                        Requested::Duplicate => tracing::info!("Run {key} already tracked"),
                        Requested::OtherWorkflow => {
                            tracing::debug!("Ignoring run {key} of workflow {:?}", run.name);
                        }
                    }
                }
                WorkflowRunWebhookEventAction::Completed => {
                    let conclusion = run.conclusion.as_deref().unwrap_or("");
                    match state.tracker.note_completed(&key, &run.name, conclusion).await {
                        Completed::Transitioned { outcome, run_attempt } => {
                            spawn_completed(&state, installation_id, &key, outcome, run_attempt);
                        }
                        Completed::Uncorrelated { outcome } => {
                            tracing::warn!("Run {key} completed without being tracked");
                            spawn_completed(&state, installation_id, &key, outcome, run.run_attempt);
                        }
                        Completed::Replay => {
                            tracing::info!("Ignoring replayed completion of run {key}");
                        }
                        Completed::OtherWorkflow => {
                            tracing::debug!("Ignoring run {key} of workflow {:?}", run.name);
                        }
                    }
                }
                _ => {}
            }
        }
        WebhookEventPayload::InstallationRepositories(inner) => {
            tracing::info!(
                "Installation {:?} for {} repositories changed",
                inner.action,
                owner.as_deref().unwrap_or("[unknown]")
            );
            let Some(installation_id) = installation_id else {
                tracing::warn!("Received installation_repositories event with no installation ID");
                return Ok((StatusCode::OK, "No installation ID").into_response());
            };
            match inner.action {
                InstallationRepositoriesWebhookEventAction::Added => {
                    let repos = inner
                        .repositories_added
                        .iter()
                        .map(|r| InstallationRepo {
                            id: r.id.into_inner(),
                            name: repo_name(&r.full_name).to_string(),
                        })
                        .collect();
                    state.github.registry.apply_added(installation_id, owner.as_deref(), repos).await;
                }
                InstallationRepositoriesWebhookEventAction::Removed => {
                    let ids: Vec<u64> =
                        inner.repositories_removed.iter().map(|r| r.id.into_inner()).collect();
                    state.github.registry.apply_removed(installation_id, &ids).await;
                }
                _ => {}
            }
        }
        WebhookEventPayload::Installation(inner) => {
            tracing::info!(
                "Installation {:?} for {}",
                inner.action,
                owner.as_deref().unwrap_or("[unknown]")
            );
            match inner.action {
                InstallationWebhookEventAction::Deleted => {
                    if let Some(installation_id) = installation_id {
                        state.github.registry.remove_installation(installation_id).await;
                    } else {
                        tracing::warn!(
                            "Received installation deleted event with no installation ID"
                        );
                    }
                }
                _ => {}
            }
        }
        _ => {
            tracing::debug!("Ignoring {:?} event", event.kind);
        }
    }

    Ok((StatusCode::OK, "Event processed").into_response())
}

fn spawn_completed(
    state: &AppState,
    installation_id: Option<u64>,
    key: &RunKey,
    outcome: RunOutcome,
    run_attempt: u64,
) {
    let Some(installation_id) = installation_id else {
        tracing::warn!("Cannot process run {key}: no installation ID on the event");
        return;
    };
    let ctx = JobContext { config: state.config.clone(), github: state.github.clone() };
    let job = CompletedRunJob {
        installation_id,
        owner: key.owner.clone(),
        repo: key.repo.clone(),
        run_id: key.run_id,
        run_attempt,
        outcome,
    };
    tokio::spawn(async move {
        if let Err(e) = courier_jobs::process_completed_run(ctx, job).await {
            tracing::error!("Failed to process completed run: {e:?}");
        }
    });
}

/// `full_name` is `owner/repo`; the registry stores the bare repo name.
fn repo_name(full_name: &str) -> &str {
    full_name.rsplit('/').next().unwrap_or(full_name)
}

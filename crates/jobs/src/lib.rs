pub mod tracker;

use std::sync::Arc;

use anyhow::{Context, Result};
use courier_core::{
    config::Config,
    models::RunOutcome,
    util::{artifact_output_path, logs_output_path},
};
use courier_github::{
    GitHub,
    artifacts::resolve_artifact,
    dispatch::{build_inputs, trigger_workflow},
    download::download_via_redirect,
};
use time::UtcDateTime;

/// Everything a background job needs. Cloned into each spawned task.
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<Config>,
    pub github: Arc<GitHub>,
}

/// A finished workflow run to act on: fetch its artifact on success, its
/// logs on failure. Spawned off the webhook handler so the delivery can be
/// acknowledged immediately.
#[derive(Debug, Clone)]
pub struct CompletedRunJob {
    pub installation_id: u64,
    pub owner: String,
    pub repo: String,
    pub run_id: u64,
    pub run_attempt: u64,
    pub outcome: RunOutcome,
}

pub async fn process_completed_run(ctx: JobContext, job: CompletedRunJob) -> Result<()> {
    let client = ctx.github.broker.installation_client(job.installation_id).await?;
    let out_dir = &ctx.config.storage.output_dir;
    match job.outcome {
        RunOutcome::Succeeded => {
            let artifact = resolve_artifact(&client, &job.owner, &job.repo, job.run_id).await?;
            let route = format!(
                "/repos/{}/{}/actions/artifacts/{}/zip",
                job.owner, job.repo, artifact.id
            );
            let dest = artifact_output_path(out_dir, &job.owner, &job.repo);
            download_via_redirect(&client, &ctx.github.http, &route, dest)
                .await
                .with_context(|| format!("Failed to fetch artifact {}", artifact.name))?;
            tracing::info!("Stored artifact {} for {}/{}", artifact.name, job.owner, job.repo);
        }
        RunOutcome::Failed => {
            let route = format!(
                "/repos/{}/{}/actions/runs/{}/attempts/{}/logs",
                job.owner, job.repo, job.run_id, job.run_attempt
            );
            let dest = logs_output_path(out_dir, &job.owner, &job.repo, UtcDateTime::now());
            download_via_redirect(&client, &ctx.github.http, &route, dest)
                .await
                .with_context(|| format!("Failed to fetch logs for run {}", job.run_id))?;
            tracing::info!(
                "Stored logs for failed run {} of {}/{}",
                job.run_id,
                job.owner,
                job.repo
            );
        }
    }
    Ok(())
}

/// Start a packaging run for one repository. Completion comes back through
/// the webhook path like any other run.
pub async fn dispatch_run(
    ctx: &JobContext,
    installation_id: u64,
    owner: &str,
    repo: &str,
) -> Result<()> {
    let client = ctx.github.broker.installation_client(installation_id).await?;
    let inputs =
        build_inputs(owner, repo, &ctx.config.github.ignored_content, UtcDateTime::now());
    trigger_workflow(&client, &ctx.config.github, owner, repo, inputs).await?;
    Ok(())
}

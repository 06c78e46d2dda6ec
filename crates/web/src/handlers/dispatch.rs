use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_core::AppError;
use courier_jobs::JobContext;

use crate::AppState;

/// Manually trigger a packaging run for one repository. The repository must
/// be covered by a current installation; the artifact arrives later through
/// the webhook path.
pub async fn dispatch(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let Some(installation_id) = state.github.registry.installation_for(&owner).await else {
        return Err(AppError::Status(StatusCode::NOT_FOUND));
    };
    if !state.github.registry.is_authorized(&owner, &repo).await {
        return Err(AppError::Status(StatusCode::NOT_FOUND));
    }
    let ctx = JobContext { config: state.config.clone(), github: state.github.clone() };
    courier_jobs::dispatch_run(&ctx, installation_id, &owner, &repo).await?;
    Ok((StatusCode::ACCEPTED, "Dispatch accepted").into_response())
}

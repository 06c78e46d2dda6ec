use courier_core::util::run_label;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::ResolveError;

/// An output bundle attached to a workflow run. Fetched fresh per completed
/// run; artifact names embed a generation timestamp, so nothing here is
/// worth caching.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactCandidate {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub expired: bool,
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
struct ArtifactList {
    total_count: u64,
    artifacts: Vec<ArtifactCandidate>,
}

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

/// Find the packaged-archive artifact for a completed run. A run may carry
/// zero, one, or several artifacts; ours is the one whose name contains the
/// repository's naming label (the workflow appends a timestamp, so this is
/// containment, not equality).
pub async fn resolve_artifact(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    run_id: u64,
) -> Result<ArtifactCandidate, ResolveError> {
    let artifacts = list_run_artifacts(client, owner, repo, run_id).await.map_err(|source| {
        ResolveError::List { owner: owner.to_string(), repo: repo.to_string(), run_id, source }
    })?;
    let label = run_label(owner, repo);
    tracing::debug!("Run {} has {} artifacts", run_id, artifacts.len());
    select_artifact(artifacts, &label).ok_or_else(|| ResolveError::NotFound {
        owner: owner.to_string(),
        repo: repo.to_string(),
        run_id,
        label,
    })
}

async fn list_run_artifacts(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    run_id: u64,
) -> octocrab::Result<Vec<ArtifactCandidate>> {
    let route = format!("/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts");
    let mut page = 1u32;
    let mut response: ArtifactList =
        client.get(&route, Some(&PageParams { per_page: 100, page })).await?;
    let mut artifacts = response.artifacts;
    while (artifacts.len() as u64) < response.total_count {
        page += 1;
        response = client.get(&route, Some(&PageParams { per_page: 100, page })).await?;
        if response.artifacts.is_empty() {
            break;
        }
        artifacts.extend(response.artifacts);
    }
    Ok(artifacts)
}

/// Exactly one artifact is expected to match. If several do, prefer the most
/// recently created one.
pub fn select_artifact(
    artifacts: Vec<ArtifactCandidate>,
    label: &str,
) -> Option<ArtifactCandidate> {
    artifacts
        .into_iter()
        .filter(|a| !a.expired && a.name.contains(label))
        .max_by_key(|a| a.created_at.as_deref().and_then(|t| OffsetDateTime::parse(t, &Rfc3339).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, name: &str, created_at: &str) -> ArtifactCandidate {
        ArtifactCandidate {
            id,
            name: name.to_string(),
            expired: false,
            created_at: Some(created_at.to_string()),
        }
    }

    #[test]
    fn matches_label_substring_only() {
        let artifacts = vec![
            candidate(1, "OWNER=A&REPO=B-2024-01-01T00-00-00", "2024-01-01T00:00:10Z"),
            candidate(2, "OWNER=X&REPO=Y-2024-01-01T00-00-00", "2024-01-01T00:00:10Z"),
        ];
        let selected = select_artifact(artifacts, "OWNER=A&REPO=B").unwrap();
        assert_eq!(selected.id, 1);
    }

    #[test]
    fn no_match_yields_none() {
        let artifacts = vec![candidate(1, "coverage-report", "2024-01-01T00:00:10Z")];
        assert!(select_artifact(artifacts, "OWNER=A&REPO=B").is_none());
        assert!(select_artifact(Vec::new(), "OWNER=A&REPO=B").is_none());
    }

    #[test]
    fn expired_artifacts_skipped() {
        let mut expired = candidate(1, "OWNER=A&REPO=B-2024-01-01T00-00-00", "2024-01-01T00:00:10Z");
        expired.expired = true;
        assert!(select_artifact(vec![expired], "OWNER=A&REPO=B").is_none());
    }

    #[test]
    fn newest_wins_on_multiple_matches() {
        let artifacts = vec![
            candidate(1, "OWNER=A&REPO=B-2024-01-01T00-00-00", "2024-01-01T00:00:10Z"),
            candidate(2, "OWNER=A&REPO=B-2024-01-02T00-00-00", "2024-01-02T00:00:10Z"),
            candidate(3, "OWNER=A&REPO=B-2023-12-31T00-00-00", "2023-12-31T00:00:10Z"),
        ];
        let selected = select_artifact(artifacts, "OWNER=A&REPO=B").unwrap();
        assert_eq!(selected.id, 2);
    }
}

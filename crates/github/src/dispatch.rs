use courier_core::{
    config::GitHubConfig,
    util::{run_label, timestamp_string},
};
use octocrab::Octocrab;
use serde::Serialize;
use time::UtcDateTime;

use crate::error::DispatchError;

/// Inputs handed to the packaging workflow. `zip_name` names the archive the
/// workflow uploads; `ignored_content` is a space-separated exclusion list,
/// omitted entirely when empty so the workflow's own default applies.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DispatchInputs {
    pub zip_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_content: Option<String>,
}

#[derive(Serialize)]
struct DispatchBody<'a> {
    r#ref: &'a str,
    inputs: DispatchInputs,
}

pub fn build_inputs(
    owner: &str,
    repo: &str,
    ignored_content: &[String],
    now: UtcDateTime,
) -> DispatchInputs {
    let zip_name = format!("{}-{}", run_label(owner, repo), timestamp_string(now));
    let ignored: Vec<&str> =
        ignored_content.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    DispatchInputs {
        zip_name,
        ignored_content: (!ignored.is_empty()).then(|| ignored.join(" ")),
    }
}

/// Fire the packaging workflow on the configured ref. The platform answers
/// 204 with no body; anything else is an error. Dispatch only starts a run,
/// so the eventual artifact arrives through the run-completed path.
pub async fn trigger_workflow(
    client: &Octocrab,
    config: &GitHubConfig,
    owner: &str,
    repo: &str,
    inputs: DispatchInputs,
) -> Result<(), DispatchError> {
    let route = format!(
        "/repos/{owner}/{repo}/actions/workflows/{}/dispatches",
        config.workflow_id
    );
    tracing::info!("Dispatching {} for {owner}/{repo} as {}", config.workflow_id, inputs.zip_name);
    let body = DispatchBody { r#ref: &config.git_ref, inputs };
    let response = client._post(route, Some(&body)).await.map_err(|source| {
        DispatchError::Request { owner: owner.to_string(), repo: repo.to_string(), source }
    })?;
    let status = response.status();
    if !status.is_success() {
        return Err(DispatchError::Status {
            owner: owner.to_string(),
            repo: repo.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(unix: i64) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(unix).unwrap()
    }

    #[test]
    fn zip_name_is_label_plus_timestamp() {
        // 2024-01-01T00:00:00Z
        let inputs = build_inputs("acme", "widget", &[], at(1_704_067_200));
        assert_eq!(inputs.zip_name, "OWNER=acme&REPO=widget-2024-01-01T00-00-00");
        assert_eq!(inputs.ignored_content, None);
    }

    #[test]
    fn ignored_content_joined_by_spaces() {
        let ignored = vec!["node_modules".to_string(), " target ".to_string(), "".to_string()];
        let inputs = build_inputs("acme", "widget", &ignored, at(1_704_067_200));
        assert_eq!(inputs.ignored_content.as_deref(), Some("node_modules target"));
    }

    #[test]
    fn empty_ignored_content_is_omitted_from_the_body() {
        let inputs = build_inputs("acme", "widget", &["  ".to_string()], at(1_704_067_200));
        let json = serde_json::to_value(&inputs).unwrap();
        assert!(json.get("ignored_content").is_none());
    }
}

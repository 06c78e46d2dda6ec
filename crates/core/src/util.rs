use std::path::{Path, PathBuf};

use time::{UtcDateTime, macros::format_description};

/// Stable naming token for a repository's packaged archive. The dispatch
/// inputs and the artifact matcher both build on this, so it must stay the
/// single source of truth for the format.
pub fn run_label(owner: &str, repo: &str) -> String { format!("OWNER={owner}&REPO={repo}") }

/// Second-resolution timestamp with `:` replaced by `-`, safe for both
/// artifact names and file names.
pub fn timestamp_string(now: UtcDateTime) -> String {
    now.format(format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"))
        .unwrap_or_default()
}

/// Destination for a successfully downloaded artifact.
pub fn artifact_output_path(dir: &Path, owner: &str, repo: &str) -> PathBuf {
    dir.join(run_label(owner, repo))
}

/// Destination for the logs of a failed run. Unlike artifacts, several log
/// bundles for the same repository may accumulate, so the name carries a
/// timestamp.
pub fn logs_output_path(dir: &Path, owner: &str, repo: &str, now: UtcDateTime) -> PathBuf {
    dir.join(format!("WORKFLOW-LOGS-{}-{}", run_label(owner, repo), timestamp_string(now)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(timestamp: i64) -> UtcDateTime { UtcDateTime::from_unix_timestamp(timestamp).unwrap() }

    #[test]
    fn label_format() {
        assert_eq!(run_label("acme", "widget"), "OWNER=acme&REPO=widget");
    }

    #[test]
    fn timestamp_format() {
        // 2024-01-01T00:00:00Z
        assert_eq!(timestamp_string(at(1704067200)), "2024-01-01T00-00-00");
    }

    #[test]
    fn output_paths() {
        let dir = Path::new("/out");
        assert_eq!(
            artifact_output_path(dir, "acme", "widget"),
            PathBuf::from("/out/OWNER=acme&REPO=widget")
        );
        assert_eq!(
            logs_output_path(dir, "acme", "widget", at(1704067200)),
            PathBuf::from("/out/WORKFLOW-LOGS-OWNER=acme&REPO=widget-2024-01-01T00-00-00")
        );
    }
}

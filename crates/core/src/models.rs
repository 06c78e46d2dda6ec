use std::fmt;

/// Identity of one workflow run. At most one live run is tracked per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub owner: String,
    pub repo: String,
    pub run_id: u64,
}

impl RunKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, run_id: u64) -> Self {
        Self { owner: owner.into(), repo: repo.into(), run_id }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.run_id)
    }
}

/// Terminal result of a workflow run. Every conclusion other than `success`
/// (failure, cancelled, timed_out, ...) is uniformly "not successful, fetch
/// logs".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

impl RunOutcome {
    pub fn from_conclusion(conclusion: &str) -> Self {
        if conclusion == "success" { Self::Succeeded } else { Self::Failed }
    }
}

/// A repository authorized under an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRepo {
    pub id: u64,
    pub name: String,
}

/// One authorization grant: an account plus the subset of its repositories
/// the app may act on. Lifecycle is entirely event-driven.
#[derive(Debug, Clone)]
pub struct Installation {
    pub id: u64,
    pub owner: String,
    pub repositories: Vec<InstallationRepo>,
}

#[cfg(test)]
mod tests {
    use super::RunOutcome;

    #[test]
    fn conclusion_mapping() {
        assert_eq!(RunOutcome::from_conclusion("success"), RunOutcome::Succeeded);
        for other in ["failure", "cancelled", "timed_out", "neutral", ""] {
            assert_eq!(RunOutcome::from_conclusion(other), RunOutcome::Failed);
        }
    }
}

use std::collections::HashMap;

use courier_core::models::{Installation, InstallationRepo};
use tokio::sync::RwLock;

/// In-memory projection of which accounts and repositories currently
/// authorize this app. Mutated only by webhook events; readers always see a
/// fully applied addition or removal, never a partial one.
///
/// A production deployment would back this with an external store; the
/// projection logic stays the same.
#[derive(Default)]
pub struct InstallationRegistry {
    inner: RwLock<HashMap<u64, Installation>>,
}

impl InstallationRegistry {
    /// Repositories added to an installation. Creates the installation
    /// record on first sight; repeated additions of the same repo id are
    /// idempotent.
    pub async fn apply_added(
        &self,
        installation_id: u64,
        owner: Option<&str>,
        repos: Vec<InstallationRepo>,
    ) {
        let mut inner = self.inner.write().await;
        let entry = inner.entry(installation_id).or_insert_with(|| Installation {
            id: installation_id,
            owner: String::new(),
            repositories: Vec::new(),
        });
        if let Some(owner) = owner {
            entry.owner = owner.to_string();
        }
        for repo in repos {
            if !entry.repositories.iter().any(|r| r.id == repo.id) {
                entry.repositories.push(repo);
            }
        }
    }

    /// Repositories removed from an installation, matched by repo id.
    pub async fn apply_removed(&self, installation_id: u64, repo_ids: &[u64]) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&installation_id) {
            entry.repositories.retain(|r| !repo_ids.contains(&r.id));
        }
    }

    /// Explicit uninstall: drop the whole record.
    pub async fn remove_installation(&self, installation_id: u64) {
        self.inner.write().await.remove(&installation_id);
    }

    pub async fn owner_for(&self, installation_id: u64) -> Option<String> {
        self.inner.read().await.get(&installation_id).map(|i| i.owner.clone())
    }

    pub async fn repos_for(&self, installation_id: u64) -> Vec<InstallationRepo> {
        self.inner
            .read()
            .await
            .get(&installation_id)
            .map(|i| i.repositories.clone())
            .unwrap_or_default()
    }

    pub async fn installation_for(&self, owner: &str) -> Option<u64> {
        self.inner.read().await.values().find(|i| i.owner == owner).map(|i| i.id)
    }

    pub async fn is_authorized(&self, owner: &str, repo: &str) -> bool {
        self.inner
            .read()
            .await
            .values()
            .any(|i| i.owner == owner && i.repositories.iter().any(|r| r.name == repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(id: u64, name: &str) -> InstallationRepo {
        InstallationRepo { id, name: name.to_string() }
    }

    #[tokio::test]
    async fn add_and_remove_repositories() {
        let registry = InstallationRegistry::default();
        registry.apply_added(42, Some("acme"), vec![repo(1, "widget"), repo(2, "gadget")]).await;
        assert_eq!(registry.owner_for(42).await.as_deref(), Some("acme"));
        assert_eq!(registry.repos_for(42).await.len(), 2);
        assert!(registry.is_authorized("acme", "widget").await);

        registry.apply_removed(42, &[1]).await;
        assert_eq!(registry.repos_for(42).await, vec![repo(2, "gadget")]);
        assert!(!registry.is_authorized("acme", "widget").await);
        assert!(registry.is_authorized("acme", "gadget").await);
    }

    #[tokio::test]
    async fn addition_is_idempotent() {
        let registry = InstallationRegistry::default();
        registry.apply_added(42, Some("acme"), vec![repo(1, "widget")]).await;
        registry.apply_added(42, None, vec![repo(1, "widget")]).await;
        assert_eq!(registry.repos_for(42).await.len(), 1);
        // Owner survives an addition without account context.
        assert_eq!(registry.owner_for(42).await.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn lookup_by_owner() {
        let registry = InstallationRegistry::default();
        registry.apply_added(42, Some("acme"), vec![repo(1, "widget")]).await;
        registry.apply_added(77, Some("globex"), vec![repo(9, "thing")]).await;
        assert_eq!(registry.installation_for("acme").await, Some(42));
        assert_eq!(registry.installation_for("initech").await, None);

        registry.remove_installation(42).await;
        assert_eq!(registry.installation_for("acme").await, None);
        assert!(registry.repos_for(42).await.is_empty());
    }
}

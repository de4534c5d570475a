//! Identity lifecycle around the rotation loop
//!
//! [`IdentityManager`] wraps a directory provider with the policy the
//! engine needs: protected identities are never deleted, freshly created
//! identities join the upload group, and the fixed-list strategy gets its
//! roster from a file or from the directory itself.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use rotor_core::config::{Config, DomainConfig};
use rotor_core::domain::identity::ProvisionedIdentity;
use rotor_directory::DirectoryProvider;

/// Directory operations with rotation policy applied.
#[derive(Clone)]
pub struct IdentityManager {
    directory: Arc<dyn DirectoryProvider>,
    /// Normalized emails that must survive every rotation.
    protected: HashSet<String>,
}

impl IdentityManager {
    /// Builds a manager for one domain.
    ///
    /// The protected set is the configured list plus the domain's admin
    /// account, normalized to lowercase with surrounding whitespace
    /// stripped.
    pub fn new(directory: Arc<dyn DirectoryProvider>, config: &Config, domain: &DomainConfig) -> Self {
        let mut protected: HashSet<String> = config
            .protected_identities
            .iter()
            .map(|email| normalize(email))
            .filter(|email| !email.is_empty())
            .collect();
        let admin = normalize(&domain.admin_email);
        if !admin.is_empty() {
            protected.insert(admin);
        }

        Self {
            directory,
            protected,
        }
    }

    pub fn directory(&self) -> Arc<dyn DirectoryProvider> {
        Arc::clone(&self.directory)
    }

    /// Whether this email must never be deleted.
    pub fn is_protected(&self, email: &str) -> bool {
        self.protected.contains(&normalize(email))
    }

    /// Creates a fresh identity and grants it upload group membership.
    ///
    /// An identity that already holds the membership is fine; the grant
    /// conflict is logged and swallowed.
    pub async fn provision(&self) -> Result<ProvisionedIdentity> {
        let identity = self
            .directory
            .create_identity()
            .await
            .context("failed to create rotation identity")?;

        match self.directory.add_to_group(&identity.email).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                warn!(email = %identity.email, "identity already in the upload group");
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context("failed to grant upload group membership"));
            }
        }

        info!(email = %identity.email, "provisioned rotation identity");
        Ok(identity)
    }

    /// Deletes a spent identity unless it is protected.
    ///
    /// # Returns
    /// `true` when the identity was deleted, `false` when protection
    /// kept it alive.
    pub async fn release(&self, email: &str) -> Result<bool> {
        if self.is_protected(email) {
            warn!(email, "refusing to delete protected identity");
            return Ok(false);
        }

        self.directory
            .delete_identity(email)
            .await
            .with_context(|| format!("failed to delete identity {email}"))?;
        info!(email, "released rotation identity");
        Ok(true)
    }

    /// Resolves the identity roster for the fixed-list strategy.
    ///
    /// Reads the configured roster file when one is set, otherwise lists
    /// the directory. Protected identities are dropped unless the config
    /// opts them in, and the result is capped at the cycle budget.
    pub async fn load_roster(&self, config: &Config) -> Result<Vec<String>> {
        let raw = match &config.identity_file {
            Some(path) => read_identity_file(path)?,
            None => self
                .directory
                .list_identities()
                .await
                .context("failed to list directory identities")?,
        };

        let mut roster: Vec<String> = raw
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        if !config.include_protected {
            roster.retain(|email| !self.is_protected(email));
        }
        roster.truncate(config.max_identities_per_cycle as usize);
        Ok(roster)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Reads a roster file, one identity per line.
fn read_identity_file(path: &Path) -> Result<Vec<String>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read identity file {}", path.display()))?;
    Ok(body.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::RecordingDirectory;

    fn domain() -> DomainConfig {
        DomainConfig {
            domain_name: "example.org".to_string(),
            admin_email: "admin@example.org".to_string(),
            credential_path: "keys/example.json".to_string(),
            remote_credential_path: None,
            group_email: "uploaders@example.org".to_string(),
        }
    }

    fn manager(directory: Arc<RecordingDirectory>, config: &Config) -> IdentityManager {
        IdentityManager::new(directory, config, &domain())
    }

    #[test]
    fn test_protection_is_normalized() {
        let config = Config {
            protected_identities: vec![" Keep@Example.ORG ".to_string()],
            ..Config::default()
        };
        let manager = manager(Arc::new(RecordingDirectory::new()), &config);

        assert!(manager.is_protected("keep@example.org"));
        assert!(manager.is_protected("KEEP@EXAMPLE.ORG "));
        // The domain admin is implicitly protected.
        assert!(manager.is_protected("admin@example.org"));
        assert!(!manager.is_protected("other@example.org"));
    }

    #[tokio::test]
    async fn test_provision_grants_membership() {
        let directory = Arc::new(RecordingDirectory::new());
        let manager = manager(Arc::clone(&directory), &Config::default());

        let identity = manager.provision().await.unwrap();

        assert_eq!(directory.created(), vec![identity.email.clone()]);
        assert_eq!(directory.joined(), vec![identity.email]);
    }

    #[tokio::test]
    async fn test_provision_tolerates_existing_membership() {
        let directory = Arc::new(RecordingDirectory::new());
        directory.set_group_conflict();
        let manager = manager(Arc::clone(&directory), &Config::default());

        assert!(manager.provision().await.is_ok());
    }

    #[tokio::test]
    async fn test_release_refuses_protected() {
        let directory = Arc::new(RecordingDirectory::new());
        let manager = manager(Arc::clone(&directory), &Config::default());

        let deleted = manager.release("admin@example.org").await.unwrap();

        assert!(!deleted);
        assert!(directory.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_release_deletes_unprotected() {
        let directory = Arc::new(RecordingDirectory::new());
        let manager = manager(Arc::clone(&directory), &Config::default());

        let deleted = manager.release("spent@example.org").await.unwrap();

        assert!(deleted);
        assert_eq!(directory.deleted(), vec!["spent@example.org".to_string()]);
    }

    #[tokio::test]
    async fn test_roster_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.txt");
        std::fs::write(&path, "a@example.org\n# comment\n\n  b@example.org  \nadmin@example.org\n")
            .unwrap();

        let mut config = Config {
            identity_file: Some(path),
            ..Config::default()
        };
        let manager = manager(Arc::new(RecordingDirectory::new()), &config);

        let roster = manager.load_roster(&config).await.unwrap();
        assert_eq!(roster, vec!["a@example.org", "b@example.org"]);

        config.include_protected = true;
        let roster = manager.load_roster(&config).await.unwrap();
        assert_eq!(
            roster,
            vec!["a@example.org", "b@example.org", "admin@example.org"]
        );

        config.max_identities_per_cycle = 1;
        let roster = manager.load_roster(&config).await.unwrap();
        assert_eq!(roster, vec!["a@example.org"]);
    }

    #[tokio::test]
    async fn test_roster_from_directory_listing() {
        let directory = Arc::new(RecordingDirectory::with_listing(&[
            "a@example.org",
            "admin@example.org",
            "b@example.org",
        ]));
        let config = Config::default();
        let manager = manager(directory, &config);

        let roster = manager.load_roster(&config).await.unwrap();
        // Order preserved, admin filtered out.
        assert_eq!(roster, vec!["a@example.org", "b@example.org"]);
    }
}

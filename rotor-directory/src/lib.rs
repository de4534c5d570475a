//! Rotor Directory Client
//!
//! A type-safe client for the identity directory behind the rotation engine.
//!
//! The engine only ever talks to the [`DirectoryProvider`] trait; the bundled
//! [`RestDirectory`] implementation speaks a small REST contract:
//!
//! - `POST   {base}/v1/users`: create an identity
//! - `GET    {base}/v1/users/{email}`: fetch one identity
//! - `DELETE {base}/v1/users/{email}`: delete an identity
//! - `GET    {base}/v1/users?domain={domain}`: list identities
//! - `PATCH  {base}/v1/users/{email}`: update an identity (suspension)
//! - `POST   {base}/v1/groups/{group}/members`: grant group membership
//!
//! Authentication is a bearer token read, together with the API endpoint,
//! from the domain's credential file.
//!
//! # Example
//!
//! ```no_run
//! use rotor_directory::{DirectoryProvider, RestDirectory};
//!
//! #[tokio::main]
//! async fn main() -> rotor_directory::Result<()> {
//!     let directory = RestDirectory::new(
//!         "https://directory.example.net",
//!         "token",
//!         "example.org",
//!         "uploaders@example.org",
//!     );
//!
//!     let identity = directory.create_identity().await?;
//!     directory.add_to_group(&identity.email).await?;
//!
//!     println!("Provisioned: {}", identity.email);
//!     Ok(())
//! }
//! ```

pub mod error;
mod groups;
mod persona;
mod users;

// Re-export commonly used types
pub use error::{DirectoryError, Result};
pub use persona::Persona;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use rotor_core::config::DomainConfig;
use rotor_core::domain::identity::ProvisionedIdentity;

/// Identity lifecycle operations the rotation engine depends on
///
/// One provider instance is scoped to a single directory domain. All
/// operations take and return plain emails; persona details stay inside
/// the provider.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Creates a fresh identity with a generated persona
    ///
    /// # Returns
    /// The new identity's credentials
    async fn create_identity(&self) -> Result<ProvisionedIdentity>;

    /// Grants the identity membership in the domain's upload group
    ///
    /// Fails with a conflict error when the identity is already a member.
    async fn add_to_group(&self, email: &str) -> Result<()>;

    /// Deletes an identity
    ///
    /// Deleting an identity that no longer exists succeeds: the goal state
    /// is reached either way.
    async fn delete_identity(&self, email: &str) -> Result<()>;

    /// Checks whether an identity exists
    async fn identity_exists(&self, email: &str) -> Result<bool>;

    /// Lists all identity emails in the domain
    async fn list_identities(&self) -> Result<Vec<String>>;

    /// Suspends or reinstates an identity
    async fn set_suspended(&self, email: &str, suspended: bool) -> Result<()>;
}

/// Opens providers for configured domains
#[async_trait]
pub trait DirectoryFactory: Send + Sync {
    /// Opens a provider scoped to the given domain
    async fn open(&self, domain: &DomainConfig) -> Result<Arc<dyn DirectoryProvider>>;
}

/// Contents of a domain credential file
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryCredentials {
    /// Directory API endpoint, e.g. `https://directory.example.net`
    pub api_base_url: String,
    /// Bearer token for the endpoint
    pub access_token: String,
}

impl DirectoryCredentials {
    /// Reads credentials from a JSON file
    pub async fn load(path: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DirectoryError::Credential {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|e| DirectoryError::Credential {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

/// REST implementation of [`DirectoryProvider`]
#[derive(Debug, Clone)]
pub struct RestDirectory {
    /// Base URL of the directory API (e.g., "https://directory.example.net")
    base_url: String,
    /// Bearer token sent with every request
    token: String,
    /// Domain this client is scoped to
    domain_name: String,
    /// Upload group for [`DirectoryProvider::add_to_group`]
    group_email: String,
    /// HTTP client instance
    client: Client,
}

impl RestDirectory {
    /// Creates a client for one directory domain
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the directory API
    /// * `token` - Bearer token for the API
    /// * `domain_name` - Domain identities live under
    /// * `group_email` - Group granting upload rights
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        domain_name: impl Into<String>,
        group_email: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            domain_name: domain_name.into(),
            group_email: group_email.into(),
            client: Client::new(),
        }
    }

    /// Opens a client for a configured domain by reading its credential file
    pub async fn from_domain(domain: &DomainConfig) -> Result<Self> {
        let credentials = DirectoryCredentials::load(domain.effective_credential_path()).await?;
        Ok(Self::new(
            credentials.api_base_url,
            credentials.access_token,
            &domain.domain_name,
            &domain.group_email,
        ))
    }

    /// Get the base URL of the directory API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the domain this client is scoped to
    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DirectoryError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| DirectoryError::ParseError(format!("failed to parse JSON response: {e}")))
    }

    /// Handle an API response that returns no useful body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DirectoryError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[async_trait]
impl DirectoryProvider for RestDirectory {
    async fn create_identity(&self) -> Result<ProvisionedIdentity> {
        let persona = Persona::generate(&self.domain_name);
        self.create_user(&persona).await?;
        debug!(email = %persona.email, "created directory identity");
        Ok(ProvisionedIdentity::new(persona.email, persona.password))
    }

    async fn add_to_group(&self, email: &str) -> Result<()> {
        self.add_member(email).await
    }

    async fn delete_identity(&self, email: &str) -> Result<()> {
        match self.delete_user(email).await {
            Err(e) if e.is_not_found() => {
                debug!(email, "identity already gone, treating delete as done");
                Ok(())
            }
            other => other,
        }
    }

    async fn identity_exists(&self, email: &str) -> Result<bool> {
        match self.get_user(email).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_identities(&self) -> Result<Vec<String>> {
        self.list_users().await
    }

    async fn set_suspended(&self, email: &str, suspended: bool) -> Result<()> {
        self.update_suspension(email, suspended).await
    }
}

/// Factory producing [`RestDirectory`] providers from domain config entries
#[derive(Debug, Clone, Default)]
pub struct RestDirectoryFactory;

#[async_trait]
impl DirectoryFactory for RestDirectoryFactory {
    async fn open(&self, domain: &DomainConfig) -> Result<Arc<dyn DirectoryProvider>> {
        let provider = RestDirectory::from_domain(domain).await?;
        Ok(Arc::new(provider))
    }
}

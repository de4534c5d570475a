//! Directory identity types

use serde::{Deserialize, Serialize};

/// Credentials for an identity created in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedIdentity {
    pub email: String,
    pub password: String,
}

impl ProvisionedIdentity {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

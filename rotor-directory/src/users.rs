//! User endpoints of the directory API

use serde::Deserialize;

use crate::RestDirectory;
use crate::error::Result;
use crate::persona::Persona;

/// One identity record as the API returns it
#[derive(Debug, Deserialize)]
struct UserRecord {
    email: String,
    #[serde(default)]
    #[allow(dead_code)]
    suspended: bool,
}

/// Response body of the list endpoint
#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<UserRecord>,
}

impl RestDirectory {
    /// Create an identity from a generated persona
    pub(crate) async fn create_user(&self, persona: &Persona) -> Result<()> {
        let url = format!("{}/v1/users", self.base_url);
        let body = serde_json::json!({
            "email": persona.email,
            "given_name": persona.given_name,
            "family_name": persona.family_name,
            "password": persona.password,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Fetch one identity record
    pub(crate) async fn get_user(&self, email: &str) -> Result<()> {
        let url = format!("{}/v1/users/{}", self.base_url, email);
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;

        self.handle_response::<UserRecord>(response).await.map(|_| ())
    }

    /// Delete one identity
    pub(crate) async fn delete_user(&self, email: &str) -> Result<()> {
        let url = format!("{}/v1/users/{}", self.base_url, email);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// List all identity emails in this client's domain
    pub(crate) async fn list_users(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/users", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("domain", self.domain_name.as_str())])
            .send()
            .await?;

        let list: UserList = self.handle_response(response).await?;
        Ok(list.users.into_iter().map(|u| u.email).collect())
    }

    /// Flip the suspended flag on one identity
    pub(crate) async fn update_suspension(&self, email: &str, suspended: bool) -> Result<()> {
        let url = format!("{}/v1/users/{}", self.base_url, email);
        let body = serde_json::json!({ "suspended": suspended });
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

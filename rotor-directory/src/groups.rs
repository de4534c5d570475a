//! Group endpoints of the directory API

use crate::RestDirectory;
use crate::error::Result;

impl RestDirectory {
    /// Add an identity to this client's upload group
    pub(crate) async fn add_member(&self, email: &str) -> Result<()> {
        let url = format!("{}/v1/groups/{}/members", self.base_url, self.group_email);
        let body = serde_json::json!({ "email": email });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

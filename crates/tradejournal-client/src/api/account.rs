//! Stats and current-user endpoints.

use serde_json::Value;

use crate::client::TradeJournalClient;
use crate::error::Result;

/// Account API client.
pub struct AccountApi {
    client: TradeJournalClient,
}

impl AccountApi {
    pub(crate) fn new(client: TradeJournalClient) -> Self {
        Self { client }
    }

    /// Trading statistics for the signed-in user.
    pub async fn stats(&self) -> Result<Value> {
        self.client.get("stats").await
    }

    /// The backend's view of the signed-in user.
    pub async fn current_user(&self) -> Result<Value> {
        self.client.get("user").await
    }
}

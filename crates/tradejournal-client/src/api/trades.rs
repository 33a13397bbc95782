//! Trades API.

use serde_json::Value;

use crate::client::TradeJournalClient;
use crate::error::Result;

/// Filters for listing trades.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ListTradesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

/// Trades API client.
pub struct TradesApi {
    client: TradeJournalClient,
}

impl TradesApi {
    pub(crate) fn new(client: TradeJournalClient) -> Self {
        Self { client }
    }

    /// List trades.
    pub async fn list(&self, query: &ListTradesQuery) -> Result<Value> {
        self.client.get_with_query("trades", query).await
    }

    /// Get a trade by ID.
    pub async fn get(&self, id: &str) -> Result<Value> {
        self.client.get(&format!("trades/{}", id)).await
    }

    /// Record a new trade.
    pub async fn create(&self, trade: &Value) -> Result<Value> {
        self.client.post("trades", trade).await
    }

    /// Update a trade.
    pub async fn update(&self, id: &str, trade: &Value) -> Result<Value> {
        self.client.put(&format!("trades/{}", id), trade).await
    }

    /// Delete a trade.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&format!("trades/{}", id)).await
    }
}

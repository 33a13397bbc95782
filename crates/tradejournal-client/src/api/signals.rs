//! Signals API.

use serde_json::Value;

use crate::client::TradeJournalClient;
use crate::error::Result;

/// Filters for listing signals.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ListSignalsQuery {
    /// Monitor that produced the signal, lowercase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Maximum number of signals to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Signals API client.
pub struct SignalsApi {
    client: TradeJournalClient,
}

impl SignalsApi {
    pub(crate) fn new(client: TradeJournalClient) -> Self {
        Self { client }
    }

    /// List signals.
    pub async fn list(&self, query: &ListSignalsQuery) -> Result<Value> {
        self.client.get_with_query("signals", query).await
    }

    /// Get a signal by ID.
    pub async fn get(&self, id: &str) -> Result<Value> {
        self.client.get(&format!("signals/{}", id)).await
    }
}

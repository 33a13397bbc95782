//! Bot configuration API.

use serde_json::Value;

use crate::client::TradeJournalClient;
use crate::error::Result;

/// Paging for bot trades and stats.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BotActivityQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Bot configuration API client.
pub struct BotsApi {
    client: TradeJournalClient,
}

impl BotsApi {
    pub(crate) fn new(client: TradeJournalClient) -> Self {
        Self { client }
    }

    /// List every bot's configuration.
    pub async fn configs(&self) -> Result<Value> {
        self.client.get("bot-config").await
    }

    /// Update one bot's configuration.
    pub async fn update_config(&self, bot_name: &str, config: &Value) -> Result<Value> {
        self.client
            .put(&format!("bot-config/{}", bot_name), config)
            .await
    }

    /// Exchange keys configured for a bot.
    pub async fn keys(&self, bot_name: &str) -> Result<Value> {
        self.client
            .get(&format!("bot-config/{}/keys", bot_name))
            .await
    }

    /// Store exchange keys for a bot.
    pub async fn save_keys(&self, bot_name: &str, keys: &Value) -> Result<Value> {
        self.client
            .put(&format!("bot-config/{}/keys", bot_name), keys)
            .await
    }

    /// Trades placed by bots.
    pub async fn trades(&self, query: &BotActivityQuery) -> Result<Value> {
        self.client.get_with_query("bot-trades", query).await
    }

    /// Aggregate bot performance.
    pub async fn stats(&self, query: &BotActivityQuery) -> Result<Value> {
        self.client.get_with_query("bot-stats", query).await
    }
}

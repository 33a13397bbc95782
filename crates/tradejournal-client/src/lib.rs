//! HTTP client for the Trading Journal backend.
//!
//! Every request goes through a [`RequestAuthBridge`], which attaches the
//! session's bearer token and, when the backend rejects it, refreshes the
//! token and resends the request once.
//!
//! # API Coverage
//!
//! - **Signals**: list, get
//! - **Trades**: list, get, create, update, delete
//! - **Account**: stats, current user
//! - **Bots**: configuration, exchange keys, bot trades, bot stats

pub mod api;
pub mod bridge;
pub mod client;
pub mod error;
pub mod transport;

pub use api::{BotActivityQuery, ListSignalsQuery, ListTradesQuery};
pub use bridge::{
    BridgeConfig, DEFAULT_RETRY_STATUSES, RequestAuthBridge, SessionAuthority, SharedAuthority,
};
pub use client::{ClientBuilder, DEFAULT_BASE_URL, TradeJournalClient};
pub use error::{Error, Result};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, PendingRetryFlag, ReqwestTransport, SharedTransport,
};

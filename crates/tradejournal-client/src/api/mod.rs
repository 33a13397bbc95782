//! API endpoint implementations.

mod account;
mod bots;
mod signals;
mod trades;

pub use account::AccountApi;
pub use bots::{BotActivityQuery, BotsApi};
pub use signals::{ListSignalsQuery, SignalsApi};
pub use trades::{ListTradesQuery, TradesApi};

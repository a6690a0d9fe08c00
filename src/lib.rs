//! ACT student-support Telegram bot.

pub mod assistant;
pub mod audit;
pub mod bot;
pub mod config;
pub mod crypto;
pub mod http;
pub mod knowledge;
pub mod metrics;
pub mod openai;
pub mod rate_limit;
pub mod session;
pub mod store;

//! Bot module - turns Telegram messages into ACT assistant replies.

pub mod commands;
pub mod intents;
pub mod pipeline;
pub mod replies;
pub mod telegram;
pub mod verification;


pub use commands::Command;
pub use intents::{Intent, route};
pub use pipeline::{Incoming, Pipeline};
pub use telegram::{Messenger, TelegramClient};

//! `telegram-client`: minimal Telegram Bot API driver.
//!
//! Covers what a long-polling chat bot needs and nothing more: typed inbound
//! messages, `sendMessage` with reply keyboards, and an async stream of
//! updates.
//!
//! # Architecture
//!
//! ```text
//! Client          ← reqwest, JSON over HTTPS, one token
//!     │
//!     ▼
//! UpdateStream    ← implements futures::Stream<Item = Result<Update>>
//!                    background getUpdates loop + mpsc channel
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use telegram_client::{poll, Client, SendMessage};
//!
//! let client = Client::new("https://api.telegram.org", &token);
//! let mut updates = poll(client.clone(), 30);
//! while let Some(update) = updates.next().await {
//!     if let Some(msg) = update?.message {
//!         client.send_message(&SendMessage::new(msg.chat.id, "hello")).await?;
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::Client;
pub use error::TelegramError;
pub use stream::UpdateStream;
pub use types::{
    Chat, KeyboardButton, Message, MessageEntity, ReplyKeyboardMarkup, ReplyKeyboardRemove,
    ReplyMarkup, SendMessage, Update, User,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, TelegramError>;

/// Start long polling with `client`. Each `getUpdates` call waits up to
/// `timeout_secs` for new messages.
pub fn poll(client: Client, timeout_secs: u64) -> UpdateStream {
    UpdateStream::new(client, timeout_secs)
}

//! The seam between the bot and its chat platform.
//!
//! Loops and dispatchers only see [`Gateway`] for outbound messages and
//! [`InboundEvent`]s arriving on mpsc channels. The Telegram implementation
//! lives in [`telegram`]; [`recording`] is an in-memory double.

pub mod recording;
pub mod telegram;

use std::future::Future;

use thiserror::Error;

pub use recording::RecordingGateway;
pub use telegram::TelegramGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Telegram(#[from] telegram_client::TelegramError),

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// What to do with the reply keyboard shown to the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever the client currently shows.
    #[default]
    Keep,
    /// One button per row, in order.
    Buttons(Vec<String>),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Keyboard,
}

impl OutgoingMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: Keyboard::Keep,
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<String>) -> Self {
        self.keyboard = Keyboard::Buttons(buttons);
        self
    }

    pub fn remove_keyboard(mut self) -> Self {
        self.keyboard = Keyboard::Remove;
        self
    }
}

/// One message from a user or the admin chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender_id: i64,
    pub chat_id: i64,
    pub message_id: i64,
    /// Full message text; for commands this includes the `/command` word.
    pub text: String,
    pub is_command: bool,
    pub first_name: String,
}

impl InboundEvent {
    /// Command name without the slash or `@botname` suffix.
    pub fn command(&self) -> Option<&str> {
        if !self.is_command {
            return None;
        }
        let word = self.text.split_whitespace().next()?;
        let word = word.strip_prefix('/').unwrap_or(word);
        Some(word.split('@').next().unwrap_or(word))
    }
}

pub trait Gateway: Send + Sync + 'static {
    fn send(&self, msg: OutgoingMessage) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

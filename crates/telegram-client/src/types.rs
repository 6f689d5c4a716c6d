use serde::{Deserialize, Serialize};

// ─── Envelope ─────────────────────────────────────────────────────────────

/// Every Bot API response: `{"ok": true, "result": ...}` or
/// `{"ok": false, "error_code": 400, "description": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

// ─── Inbound ──────────────────────────────────────────────────────────────

/// One entry of `getUpdates`. Only plain messages are modelled; other
/// update kinds deserialize with `message: None` and are skipped.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Command name without the leading slash or `@botname` suffix, if the
    /// message starts with a bot command.
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?;
        let starts_with_command = self
            .entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0);
        if !starts_with_command {
            return None;
        }
        let word = text.split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        Some(word.split('@').next().unwrap_or(word))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i64,
    pub length: i64,
}

// ─── Outbound ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

impl SendMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_markup: None,
        }
    }

    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

impl ReplyMarkup {
    /// A keyboard with one button per row.
    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
            keyboard: labels
                .into_iter()
                .map(|l| vec![KeyboardButton { text: l.into() }])
                .collect(),
            resize_keyboard: true,
        })
    }

    pub fn remove() -> Self {
        ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        })
    }
}

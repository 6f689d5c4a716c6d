use futures::{Stream, StreamExt};
use telegram_client::{Client, Message, ReplyMarkup, SendMessage, Update};
use tokio::sync::{mpsc, watch};

use super::{Gateway, GatewayError, InboundEvent, Keyboard, OutgoingMessage};
use crate::shutdown::wait_for_shutdown;

pub struct TelegramGateway {
    client: Client,
}

impl TelegramGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Gateway for TelegramGateway {
    async fn send(&self, msg: OutgoingMessage) -> Result<(), GatewayError> {
        let mut out = SendMessage::new(msg.chat_id, msg.text);
        match msg.keyboard {
            Keyboard::Keep => {}
            Keyboard::Buttons(labels) => out = out.with_markup(ReplyMarkup::column(labels)),
            Keyboard::Remove => out = out.with_markup(ReplyMarkup::remove()),
        }
        self.client.send_message(&out).await?;
        Ok(())
    }
}

impl InboundEvent {
    /// Text messages with a known sender; everything else is dropped.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let from = msg.from.as_ref()?;
        let text = msg.text.clone()?;
        Some(Self {
            sender_id: from.id,
            chat_id: msg.chat.id,
            message_id: msg.message_id,
            is_command: msg.command().is_some(),
            text,
            first_name: from.first_name.clone(),
        })
    }
}

/// Fan updates out to the user loop and the admin loop. Messages from the
/// admin chat go to `admin`, everything else to `users`.
pub async fn route_updates<S>(
    mut updates: S,
    admin_chat_id: i64,
    users: mpsc::Sender<InboundEvent>,
    admin: mpsc::Sender<InboundEvent>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Stream<Item = telegram_client::Result<Update>> + Unpin,
{
    tracing::info!("update router started");
    loop {
        let next = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            next = updates.next() => next,
        };
        let update = match next {
            None => break,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "polling for updates failed");
                continue;
            }
            Some(Ok(update)) => update,
        };
        let Some(event) = update.message.as_ref().and_then(InboundEvent::from_message) else {
            tracing::debug!(update_id = update.update_id, "ignoring non-text update");
            continue;
        };
        let target = if event.chat_id == admin_chat_id {
            &admin
        } else {
            &users
        };
        if target.send(event).await.is_err() {
            tracing::warn!("inbound loop has gone away; stopping update router");
            break;
        }
    }
    tracing::info!("update router stopped");
}

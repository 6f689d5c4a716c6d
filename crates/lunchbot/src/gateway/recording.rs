use std::sync::Mutex;

use super::{Gateway, GatewayError, OutgoingMessage};

/// Keeps every message it is asked to send. Chats listed in `fail_for`
/// reject their messages instead, as do the next `fail_next` sends to any
/// chat.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutgoingMessage>>,
    fail_for: Mutex<Vec<i64>>,
    fail_next: Mutex<usize>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_chat(&self, chat_id: i64) {
        self.fail_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(chat_id);
    }

    /// Reject the next `count` sends whatever their chat.
    pub fn fail_next(&self, count: usize) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<OutgoingMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id).into_iter().map(|m| m.text).collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Gateway for RecordingGateway {
    async fn send(&self, msg: OutgoingMessage) -> Result<(), GatewayError> {
        let one_off = {
            let mut left = self.fail_next.lock().unwrap_or_else(|e| e.into_inner());
            let fail = *left > 0;
            *left = left.saturating_sub(1);
            fail
        };
        let failing = one_off
            || self
                .fail_for
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(&msg.chat_id);
        if failing {
            return Err(GatewayError::Rejected(format!("chat {}", msg.chat_id)));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(msg);
        Ok(())
    }
}

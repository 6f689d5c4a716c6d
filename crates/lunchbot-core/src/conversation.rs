//! Pending multi-step dialog state, one slot per user.
//!
//! When the bot sends a prompt that needs a free-text answer it arms an
//! [`Expectation`] for that user. The next free-text message that is not a
//! dish selection takes the expectation (read and delete in one step) and is
//! routed to the matching handler. Arming a new expectation replaces any
//! unconsumed one; there is no queue.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Which answer the bot is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwaitAction {
    /// "<organization name> HH:MM"
    AwaitOrgName,
    AwaitAddress,
    /// Organization UUID to join.
    AwaitJoinId,
    AwaitFirstName,
    AwaitLastName,
    AwaitMiddleName,
}

impl AwaitAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AwaitAction::AwaitOrgName => "await_org_name",
            AwaitAction::AwaitAddress => "await_address",
            AwaitAction::AwaitJoinId => "await_join_id",
            AwaitAction::AwaitFirstName => "await_first_name",
            AwaitAction::AwaitLastName => "await_last_name",
            AwaitAction::AwaitMiddleName => "await_middle_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub action: AwaitAction,
    /// Message id expected to carry the answer. The prompt itself takes the
    /// next id after the command, so the answer is usually command id + 2.
    pub sequence_marker: i64,
    /// Answers collected by earlier steps of the same dialog.
    pub carried_data: String,
}

/// Distance between a command's message id and the id of the user's reply.
pub const REPLY_MARKER_STEP: i64 = 2;

#[derive(Debug, Default)]
pub struct ConversationStore {
    slots: Mutex<HashMap<i64, Expectation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `action` for `user_id`, replacing whatever was pending.
    pub fn set_expectation(
        &self,
        user_id: i64,
        action: AwaitAction,
        sequence_marker: i64,
        carried_data: impl Into<String>,
    ) {
        let expectation = Expectation {
            action,
            sequence_marker,
            carried_data: carried_data.into(),
        };
        let replaced = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id, expectation);
        if let Some(old) = replaced {
            tracing::debug!(
                user_id,
                discarded = old.action.as_str(),
                armed = action.as_str(),
                "pending expectation overwritten"
            );
        }
    }

    /// Remove and return the pending expectation for `user_id`.
    ///
    /// Each armed expectation is returned by at most one call.
    pub fn take_expectation(&self, user_id: i64) -> Option<Expectation> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user_id)
    }
}

//! Inbound dispatch loops.
//!
//! Each chat source (users, the admin chat) has its own loop that handles
//! one [`InboundEvent`] at a time. An event is classified as a command, a
//! menu keyword, a dish label, or free text; free text takes the sender's
//! pending [`Expectation`](lunchbot_core::conversation::Expectation) and is
//! routed to the matching step of a multi-step dialog.

pub mod admin;
pub mod replies;
pub mod user;

use std::sync::Arc;

use lunchbot_core::config::Config;
use lunchbot_core::conversation::{AwaitAction, ConversationStore, REPLY_MARKER_STEP};
use lunchbot_core::lunch_time::LunchTime;
use lunchbot_core::menu::Menu;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::types::{Dish, Organization};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

pub use admin::AdminLoop;
pub use user::UserLoop;

use crate::bounded::{send, store_call, CallError};
use crate::gateway::{Gateway, InboundEvent, OutgoingMessage};
use crate::shutdown::wait_for_shutdown;

/// Lunch times an organization may pick.
#[derive(Debug, Clone, Copy)]
pub struct LunchWindow {
    pub earliest: LunchTime,
    pub latest: LunchTime,
}

/// Everything a dispatch loop needs. Cheap to clone.
pub struct Context<G> {
    pub book: Arc<OrderBook>,
    pub menu: Arc<Menu>,
    pub conversations: Arc<ConversationStore>,
    pub gateway: Arc<G>,
    pub window: LunchWindow,
}

impl<G> Clone for Context<G> {
    fn clone(&self) -> Self {
        Self {
            book: Arc::clone(&self.book),
            menu: Arc::clone(&self.menu),
            conversations: Arc::clone(&self.conversations),
            gateway: Arc::clone(&self.gateway),
            window: self.window,
        }
    }
}

impl<G: Gateway> Context<G> {
    pub fn new(
        book: Arc<OrderBook>,
        menu: Arc<Menu>,
        conversations: Arc<ConversationStore>,
        gateway: Arc<G>,
        cfg: &Config,
    ) -> Self {
        Self {
            book,
            menu,
            conversations,
            gateway,
            window: LunchWindow {
                earliest: cfg.earliest_lunch,
                latest: cfg.latest_lunch,
            },
        }
    }

    /// Run a store operation against the order book off the async runtime.
    async fn call<T, F>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce(&OrderBook) -> lunchbot_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let book = Arc::clone(&self.book);
        store_call(move || f(&*book)).await
    }

    /// Send a reply. Delivery failures are logged and otherwise ignored.
    async fn reply(&self, msg: OutgoingMessage) {
        let chat_id = msg.chat_id;
        if let Err(e) = send(&*self.gateway, msg).await {
            tracing::warn!(chat_id, error = %e, "reply not delivered");
        }
    }

    async fn say(&self, chat_id: i64, text: impl Into<String>) {
        self.reply(OutgoingMessage::text(chat_id, text)).await;
    }

    /// Arm `action` for the sender, expecting the answer to follow the
    /// prompt sent in reply to `ev`.
    fn arm(&self, ev: &InboundEvent, action: AwaitAction, carried: impl Into<String>) {
        self.conversations.set_expectation(
            ev.sender_id,
            action,
            ev.message_id + REPLY_MARKER_STEP,
            carried,
        );
    }

    /// Validate a "name HH:MM" answer. On failure, reply with the reason and
    /// re-arm the same step.
    async fn org_request(&self, ev: &InboundEvent) -> Option<(String, LunchTime)> {
        match parse_org_request(&ev.text, self.window) {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                tracing::debug!(user_id = ev.sender_id, %reason, "organization request rejected");
                self.say(ev.chat_id, reason).await;
                self.arm(ev, AwaitAction::AwaitOrgName, "");
                None
            }
        }
    }

    /// Store the address answer. `carried` names the organization; empty
    /// means the sender's own.
    async fn save_address(&self, ev: &InboundEvent, carried: &str) -> Result<Organization, CallError> {
        let address = ev.text.clone();
        match carried.parse::<Uuid>() {
            Ok(org_id) => {
                self.call(move |book| book.set_organization_address(org_id, &address))
                    .await
            }
            Err(_) => {
                let user_id = ev.sender_id;
                self.call(move |book| book.set_address(user_id, &address))
                    .await
            }
        }
    }
}

/// One button per dish, then the way back.
fn dish_buttons(dishes: &[Dish]) -> Vec<String> {
    let mut buttons: Vec<String> = dishes.iter().map(Dish::label).collect();
    buttons.push(replies::BACK_TO_MENU.to_string());
    buttons
}

/// Split "<name...> HH:MM" and check the time against the window. The error
/// is the reply text.
pub fn parse_org_request(text: &str, window: LunchWindow) -> Result<(String, LunchTime), String> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let Some((time, name)) = fields.split_last() else {
        return Err(replies::INVALID_REQUEST.to_string());
    };
    if name.is_empty() {
        return Err(replies::INVALID_REQUEST.to_string());
    }
    let lunch = time
        .parse::<LunchTime>()
        .map_err(|e| replies::invalid_lunch_time(&e.to_string()))?;
    if lunch > window.latest {
        return Err(replies::lunch_too_late(window.latest));
    }
    if lunch < window.earliest {
        return Err(replies::lunch_too_early(window.earliest));
    }
    Ok((name.join(" "), lunch))
}

/// Feed events to `handle` one at a time until shutdown or the channel
/// closes.
async fn drive<F, Fut>(
    name: &'static str,
    mut events: mpsc::Receiver<InboundEvent>,
    mut shutdown: watch::Receiver<bool>,
    mut handle: F,
) where
    F: FnMut(InboundEvent) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    tracing::info!(source = name, "inbound loop started");
    loop {
        let event = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            event = events.recv() => event,
        };
        let Some(event) = event else { break };
        handle(event).await;
    }
    tracing::info!(source = name, "inbound loop stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::{config, Harness};

    pub(crate) fn window() -> LunchWindow {
        LunchWindow {
            earliest: "11:00".parse().unwrap(),
            latest: "16:00".parse().unwrap(),
        }
    }

    pub(crate) fn context(h: &Harness) -> Context<crate::gateway::RecordingGateway> {
        let cfg = config();
        Context::new(
            Arc::clone(&h.book),
            Arc::new(Menu::from_config(&cfg.menu)),
            Arc::new(ConversationStore::new()),
            Arc::clone(&h.gateway),
            &cfg,
        )
    }

    pub(crate) fn text(sender: i64, message_id: i64, text: &str) -> InboundEvent {
        InboundEvent {
            sender_id: sender,
            chat_id: sender,
            message_id,
            text: text.to_string(),
            is_command: text.starts_with('/'),
            first_name: "Ann".to_string(),
        }
    }

    #[test]
    fn org_request_splits_name_and_time() {
        let (name, lunch) = parse_org_request("Acme  Rocket Co 12:30", window()).unwrap();
        assert_eq!(name, "Acme Rocket Co");
        assert_eq!(lunch.to_string(), "12:30");
    }

    #[test]
    fn org_request_rejections() {
        assert_eq!(
            parse_org_request("12:30", window()).unwrap_err(),
            replies::INVALID_REQUEST
        );
        assert_eq!(
            parse_org_request("", window()).unwrap_err(),
            replies::INVALID_REQUEST
        );
        assert!(parse_org_request("Acme 1230", window())
            .unwrap_err()
            .starts_with("Invalid lunch time"));
        assert!(parse_org_request("Acme 24:00", window())
            .unwrap_err()
            .contains("hour 24"));
        assert!(parse_org_request("Acme 12:75", window())
            .unwrap_err()
            .contains("minute 75"));
        assert_eq!(
            parse_org_request("Acme 16:01", window()).unwrap_err(),
            replies::lunch_too_late(window().latest)
        );
        assert_eq!(
            parse_org_request("Acme 10:59", window()).unwrap_err(),
            replies::lunch_too_early(window().earliest)
        );
        assert!(parse_org_request("Acme 16:00", window()).is_ok());
        assert!(parse_org_request("Acme 11:00", window()).is_ok());
    }
}

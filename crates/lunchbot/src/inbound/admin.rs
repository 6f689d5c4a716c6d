use std::sync::Mutex;

use lunchbot_core::conversation::AwaitAction;
use tokio::sync::{mpsc, watch};

use super::replies::{self, BACK_TO_MENU, MENU};
use super::{dish_buttons, drive, Context};
use crate::bounded::CallError;
use crate::gateway::{Gateway, InboundEvent, OutgoingMessage};

/// What tapping a dish in the admin chat does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DishMode {
    /// Browsing orderable dishes; a tap stops the dish.
    #[default]
    Stop,
    /// Browsing stopped dishes; a tap makes the dish orderable again.
    Activate,
}

/// Handles the admin chat: dish availability and organizations created on
/// behalf of customers.
pub struct AdminLoop<G> {
    ctx: Context<G>,
    chat_id: i64,
    mode: Mutex<DishMode>,
}

impl<G: Gateway> AdminLoop<G> {
    pub fn new(ctx: Context<G>, chat_id: i64) -> Self {
        Self {
            ctx,
            chat_id,
            mode: Mutex::new(DishMode::default()),
        }
    }

    /// Greets the admin chat with the command list, then handles events.
    pub async fn run(self, events: mpsc::Receiver<InboundEvent>, shutdown: watch::Receiver<bool>) {
        self.ctx.say(self.chat_id, replies::ADMIN_HELP).await;
        drive("admin", events, shutdown, |ev| self.handle(ev)).await;
    }

    pub fn mode(&self) -> DishMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_mode(&self, mode: DishMode) {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    pub async fn handle(&self, ev: InboundEvent) {
        if let Err(e) = self.dispatch(&ev).await {
            tracing::error!(text = %ev.text, error = %e, "admin message handling failed");
        }
    }

    async fn dispatch(&self, ev: &InboundEvent) -> Result<(), CallError> {
        if let Some(command) = ev.command() {
            match command {
                "info" => self.ctx.say(ev.chat_id, replies::ADMIN_HELP).await,
                "all_active_dishes" => {
                    self.set_mode(DishMode::Stop);
                    self.send_categories(ev).await;
                }
                "all_stopped_dishes" => {
                    self.set_mode(DishMode::Activate);
                    self.send_categories(ev).await;
                }
                "create_organization" => {
                    self.ctx
                        .reply(
                            OutgoingMessage::text(ev.chat_id, replies::ADMIN_CREATE_PROMPT)
                                .remove_keyboard(),
                        )
                        .await;
                    self.ctx.arm(ev, AwaitAction::AwaitOrgName, "");
                }
                other => tracing::debug!(command = other, "unknown admin command"),
            }
            return Ok(());
        }

        let text = ev.text.trim();
        if self.ctx.menu.is_category(text) {
            self.send_dishes(ev, text).await;
            return Ok(());
        }
        if text == MENU || text == BACK_TO_MENU {
            self.send_categories(ev).await;
            return Ok(());
        }
        if self.ctx.menu.find(text).is_some() {
            let stop = self.mode() == DishMode::Stop;
            if let Some(dish) = self.ctx.menu.set_stopped(text, stop) {
                self.send_dishes(ev, &dish.category).await;
            }
            return Ok(());
        }

        let Some(expectation) = self.ctx.conversations.take_expectation(ev.sender_id) else {
            return Ok(());
        };
        match expectation.action {
            AwaitAction::AwaitOrgName => self.create_organization(ev).await,
            AwaitAction::AwaitAddress => {
                self.ctx.save_address(ev, &expectation.carried_data).await?;
                self.ctx.say(ev.chat_id, replies::ADDRESS_SAVED).await;
                Ok(())
            }
            other => {
                tracing::debug!(action = other.as_str(), "no admin handler for pending prompt");
                Ok(())
            }
        }
    }

    async fn send_categories(&self, ev: &InboundEvent) {
        let buttons = self.ctx.menu.categories().to_vec();
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, MENU).with_buttons(buttons))
            .await;
    }

    /// Dishes of `category` that a tap would affect in the current mode.
    async fn send_dishes(&self, ev: &InboundEvent, category: &str) {
        let dishes = match self.mode() {
            DishMode::Stop => self.ctx.menu.active_dishes(category),
            DishMode::Activate => self.ctx.menu.stopped_dishes(category),
        };
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, category).with_buttons(dish_buttons(&dishes)))
            .await;
    }

    /// Same "name HH:MM" dialog as for users, but nobody joins the new
    /// organization; the address answer is tied to it by id.
    async fn create_organization(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let Some((name, lunch)) = self.ctx.org_request(ev).await else {
            return Ok(());
        };
        let org = self
            .ctx
            .call(move |book| book.add_organization(&name, lunch, None))
            .await?;

        self.ctx
            .say(ev.chat_id, replies::admin_organization_created(&org.name))
            .await;
        self.ctx.say(ev.chat_id, org.id.to_string()).await;
        self.ctx.say(ev.chat_id, replies::ADMIN_ADDRESS_PROMPT).await;
        self.ctx.arm(ev, AwaitAction::AwaitAddress, org.id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Keyboard, RecordingGateway};
    use crate::inbound::tests::context;
    use crate::testing::{Harness, ADMIN_CHAT};

    const ADMIN: i64 = 77;

    fn admin(h: &Harness) -> AdminLoop<RecordingGateway> {
        AdminLoop::new(context(h), ADMIN_CHAT)
    }

    fn event(message_id: i64, text: &str) -> InboundEvent {
        InboundEvent {
            sender_id: ADMIN,
            chat_id: ADMIN_CHAT,
            message_id,
            text: text.to_string(),
            is_command: text.starts_with('/'),
            first_name: "Admin".to_string(),
        }
    }

    fn last_buttons(h: &Harness) -> Vec<String> {
        match h.gateway.sent_to(ADMIN_CHAT).last().map(|m| m.keyboard.clone()) {
            Some(Keyboard::Buttons(b)) => b,
            other => panic!("no buttons: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_and_reactivate_a_dish() {
        let h = Harness::at_local(10, 0);
        let bot = admin(&h);

        bot.handle(event(1, "/all_active_dishes")).await;
        assert_eq!(last_buttons(&h), vec!["Soups", "Drinks"]);
        bot.handle(event(3, "Drinks")).await;
        assert_eq!(
            last_buttons(&h),
            vec!["Tea - 20.00", "Compote - 30.00", BACK_TO_MENU]
        );

        bot.handle(event(5, "Tea - 20.00")).await;
        let tea = bot.ctx.menu.find("Tea - 20.00").unwrap();
        assert!(bot.ctx.menu.is_stopped(&tea));
        assert_eq!(last_buttons(&h), vec!["Compote - 30.00", BACK_TO_MENU]);

        bot.handle(event(7, "/all_stopped_dishes")).await;
        assert_eq!(bot.mode(), DishMode::Activate);
        bot.handle(event(9, "Drinks")).await;
        assert_eq!(last_buttons(&h), vec!["Tea - 20.00", BACK_TO_MENU]);

        bot.handle(event(11, "Tea - 20.00")).await;
        assert!(!bot.ctx.menu.is_stopped(&tea));
        assert_eq!(last_buttons(&h), vec![BACK_TO_MENU]);
    }

    #[tokio::test]
    async fn create_organization_without_joining() {
        let h = Harness::at_local(10, 0);
        let bot = admin(&h);

        bot.handle(event(1, "/create_organization")).await;
        bot.handle(event(3, "Acme 10:00")).await;
        assert_eq!(
            h.gateway.texts_to(ADMIN_CHAT).last().unwrap(),
            &replies::lunch_too_early("11:00".parse().unwrap())
        );

        h.gateway.clear();
        bot.handle(event(5, "Acme Corp 13:00")).await;
        let texts = h.gateway.texts_to(ADMIN_CHAT);
        assert_eq!(texts[0], replies::admin_organization_created("Acme Corp"));
        let org_id: uuid::Uuid = texts[1].parse().unwrap();
        assert_eq!(texts[2], replies::ADMIN_ADDRESS_PROMPT);

        let org = h.book.organization_by_id(org_id).unwrap();
        assert_eq!(org.owner_id, None);
        assert!(h.book.user(ADMIN).is_err());

        bot.handle(event(7, "5 Side Rd")).await;
        let org = h.book.organization_by_id(org_id).unwrap();
        assert_eq!(org.address.as_deref(), Some("5 Side Rd"));
        assert_eq!(
            h.gateway.texts_to(ADMIN_CHAT).last().unwrap(),
            replies::ADDRESS_SAVED
        );
    }

    #[tokio::test]
    async fn run_greets_the_admin_chat() {
        let h = Harness::at_local(10, 0);
        let (tx, rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        drop(tx);
        admin(&h).run(rx, stop_rx).await;
        assert_eq!(h.gateway.texts_to(ADMIN_CHAT), vec![replies::ADMIN_HELP]);
    }
}

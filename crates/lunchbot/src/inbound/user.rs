use lunchbot_core::conversation::{AwaitAction, Expectation};
use lunchbot_core::types::Dish;
use lunchbot_core::LunchError;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::replies::{self, BACK_TO_MENU, CANCEL_ORDER, CLEAR_ORDER, CONFIRM_ORDER, MENU};
use super::{dish_buttons, drive, Context};
use crate::bounded::CallError;
use crate::gateway::{Gateway, InboundEvent, OutgoingMessage};

/// Profile answers are joined with this in `carried_data`. Multi-line
/// answers are refused, so it never occurs inside one.
const CARRY_SEPARATOR: char = '\n';

/// Handles messages from users: registration, organizations, ordering and
/// the profile dialog.
pub struct UserLoop<G> {
    ctx: Context<G>,
}

impl<G: Gateway> UserLoop<G> {
    pub fn new(ctx: Context<G>) -> Self {
        Self { ctx }
    }

    pub async fn run(self, events: mpsc::Receiver<InboundEvent>, shutdown: watch::Receiver<bool>) {
        drive("user", events, shutdown, |ev| self.handle(ev)).await;
    }

    /// Handle one event. Never fails: domain errors become replies, the rest
    /// is logged.
    pub async fn handle(&self, ev: InboundEvent) {
        let Err(e) = self.dispatch(&ev).await else {
            return;
        };
        let reply = match e.domain() {
            Some(LunchError::DeadlineExceeded) => replies::LUNCH_TIME_PASSED,
            Some(LunchError::UserNotFound(_)) => replies::REGISTER_FIRST,
            Some(LunchError::NotInOrganization(_)) => replies::JOIN_FIRST,
            _ => {
                tracing::error!(user_id = ev.sender_id, text = %ev.text, error = %e, "message handling failed");
                return;
            }
        };
        self.ctx.say(ev.chat_id, reply).await;
    }

    async fn dispatch(&self, ev: &InboundEvent) -> Result<(), CallError> {
        if let Some(command) = ev.command() {
            return self.command(command, ev).await;
        }
        let text = ev.text.trim();
        if self.ctx.menu.is_category(text) {
            return self.send_dishes(ev, text).await;
        }
        match text {
            MENU | BACK_TO_MENU => self.send_menu(ev).await,
            CONFIRM_ORDER => self.confirm(ev).await,
            CLEAR_ORDER => self.clear(ev).await,
            CANCEL_ORDER => self.cancel(ev).await,
            _ => {
                if let Some(dish) = self.ctx.menu.find(text) {
                    return self.add_dish(ev, dish).await;
                }
                match self.ctx.conversations.take_expectation(ev.sender_id) {
                    Some(expectation) => self.answer(ev, expectation).await,
                    None => {
                        tracing::debug!(user_id = ev.sender_id, "unmatched message");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn command(&self, command: &str, ev: &InboundEvent) -> Result<(), CallError> {
        tracing::debug!(user_id = ev.sender_id, command, "command");
        match command {
            "start" => self.ctx.say(ev.chat_id, replies::WELCOME).await,
            "register" => {
                let (id, chat, first) = (ev.sender_id, ev.chat_id, ev.first_name.clone());
                let created = self
                    .ctx
                    .call(move |book| book.register_user(id, chat, &first))
                    .await?;
                if created {
                    tracing::info!(user_id = id, "user registered");
                }
                let reply = if created {
                    replies::REGISTERED
                } else {
                    replies::ALREADY_REGISTERED
                };
                self.ctx.say(ev.chat_id, reply).await;
            }
            "menu" => self.send_menu(ev).await?,
            "create" => self.prompt(ev, replies::CREATE_PROMPT, AwaitAction::AwaitOrgName).await,
            "join" => self.prompt(ev, replies::JOIN_PROMPT, AwaitAction::AwaitJoinId).await,
            "address" => self.prompt(ev, replies::ADDRESS_PROMPT, AwaitAction::AwaitAddress).await,
            "profile" => {
                self.prompt(ev, replies::FIRST_NAME_PROMPT, AwaitAction::AwaitFirstName)
                    .await
            }
            other => tracing::debug!(user_id = ev.sender_id, command = other, "unknown command"),
        }
        Ok(())
    }

    async fn prompt(&self, ev: &InboundEvent, text: &str, action: AwaitAction) {
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, text).remove_keyboard())
            .await;
        self.ctx.arm(ev, action, "");
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    /// Categories, plus confirm/clear once something is ordered. A confirmed
    /// order can only be cancelled.
    async fn send_menu(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let user_id = ev.sender_id;
        let (confirmed, any) = self
            .ctx
            .call(move |book| Ok((book.has_confirmed_order(user_id)?, book.has_any_orders(user_id)?)))
            .await?;
        let msg = if confirmed {
            OutgoingMessage::text(ev.chat_id, replies::ALREADY_CONFIRMED)
                .with_buttons(vec![CANCEL_ORDER.to_string()])
        } else {
            let mut buttons = self.ctx.menu.categories().to_vec();
            if any {
                buttons.extend(order_buttons());
            }
            OutgoingMessage::text(ev.chat_id, MENU).with_buttons(buttons)
        };
        self.ctx.reply(msg).await;
        Ok(())
    }

    async fn send_dishes(&self, ev: &InboundEvent, category: &str) -> Result<(), CallError> {
        let user_id = ev.sender_id;
        let any = self.ctx.call(move |book| book.has_any_orders(user_id)).await?;
        let mut buttons = dish_buttons(&self.ctx.menu.active_dishes(category));
        if any {
            buttons.extend(order_buttons());
        }
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, category).with_buttons(buttons))
            .await;
        Ok(())
    }

    async fn add_dish(&self, ev: &InboundEvent, dish: Dish) -> Result<(), CallError> {
        if self.ctx.menu.is_stopped(&dish) {
            self.ctx.say(ev.chat_id, replies::DISH_UNAVAILABLE).await;
            return Ok(());
        }
        let user_id = ev.sender_id;
        let category = dish.category.clone();
        let dishes = self
            .ctx
            .call(move |book| {
                book.add_dish(user_id, dish)?;
                book.user_dishes(user_id)
            })
            .await?;
        self.ctx
            .say(ev.chat_id, replies::order_summary(&dishes))
            .await;
        self.send_dishes(ev, &category).await
    }

    async fn confirm(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let user_id = ev.sender_id;
        let confirmed = self.ctx.call(move |book| book.confirm_order(user_id)).await?;
        let text = if confirmed == 0 {
            replies::NOTHING_TO_CONFIRM
        } else {
            tracing::info!(user_id, lines = confirmed, "order confirmed");
            replies::CONFIRMED
        };
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, text).remove_keyboard())
            .await;
        Ok(())
    }

    async fn clear(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let user_id = ev.sender_id;
        self.ctx
            .call(move |book| book.clear_orders(user_id, book.today()))
            .await?;
        self.ctx
            .reply(OutgoingMessage::text(ev.chat_id, replies::CLEARED).remove_keyboard())
            .await;
        self.send_menu(ev).await
    }

    async fn cancel(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let user_id = ev.sender_id;
        let cancelled = self
            .ctx
            .call(move |book| book.clear_orders_with_deadline_check(user_id, book.today()))
            .await;
        match cancelled {
            Ok(lines) => {
                tracing::info!(user_id, lines, "order cancelled");
                self.ctx.say(ev.chat_id, replies::CANCELLED).await;
                self.send_menu(ev).await
            }
            Err(e) if e.is_deadline() => {
                self.ctx.say(ev.chat_id, replies::CANNOT_CANCEL).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Multi-step dialogs
    // -----------------------------------------------------------------------

    async fn answer(&self, ev: &InboundEvent, expectation: Expectation) -> Result<(), CallError> {
        tracing::debug!(
            user_id = ev.sender_id,
            action = expectation.action.as_str(),
            marker = expectation.sequence_marker,
            message_id = ev.message_id,
            "answer to pending prompt"
        );
        match expectation.action {
            AwaitAction::AwaitOrgName => self.create_organization(ev).await,
            AwaitAction::AwaitJoinId => self.join_organization(ev).await,
            AwaitAction::AwaitAddress => {
                self.ctx.save_address(ev, &expectation.carried_data).await?;
                self.ctx.say(ev.chat_id, replies::ADDRESS_SAVED).await;
                self.ctx.say(ev.chat_id, replies::MENU_HINT).await;
                Ok(())
            }
            AwaitAction::AwaitFirstName
            | AwaitAction::AwaitLastName
            | AwaitAction::AwaitMiddleName
                if ev.text.trim().contains(CARRY_SEPARATOR) =>
            {
                self.ctx.say(ev.chat_id, replies::ONE_LINE_NAME).await;
                self.ctx.arm(ev, expectation.action, expectation.carried_data);
                Ok(())
            }
            AwaitAction::AwaitFirstName => {
                self.ctx.say(ev.chat_id, replies::LAST_NAME_PROMPT).await;
                self.ctx.arm(ev, AwaitAction::AwaitLastName, ev.text.trim());
                Ok(())
            }
            AwaitAction::AwaitLastName => {
                self.ctx.say(ev.chat_id, replies::MIDDLE_NAME_PROMPT).await;
                let carried = format!(
                    "{}{CARRY_SEPARATOR}{}",
                    expectation.carried_data,
                    ev.text.trim()
                );
                self.ctx.arm(ev, AwaitAction::AwaitMiddleName, carried);
                Ok(())
            }
            AwaitAction::AwaitMiddleName => self.save_profile(ev, &expectation.carried_data).await,
        }
    }

    async fn create_organization(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let Some((name, lunch)) = self.ctx.org_request(ev).await else {
            return Ok(());
        };
        let owner = ev.sender_id;
        let org = self
            .ctx
            .call(move |book| book.add_organization(&name, lunch, Some(owner)))
            .await?;

        self.ctx
            .say(ev.chat_id, replies::organization_created(&org.name))
            .await;
        self.ctx.say(ev.chat_id, org.id.to_string()).await;
        self.ctx.say(ev.chat_id, replies::ADDRESS_PROMPT).await;
        self.ctx.arm(ev, AwaitAction::AwaitAddress, org.id.to_string());
        Ok(())
    }

    async fn join_organization(&self, ev: &InboundEvent) -> Result<(), CallError> {
        let Ok(org_id) = ev.text.trim().parse::<Uuid>() else {
            self.ctx.say(ev.chat_id, replies::INVALID_REQUEST).await;
            self.ctx.arm(ev, AwaitAction::AwaitJoinId, "");
            return Ok(());
        };
        let user_id = ev.sender_id;
        match self
            .ctx
            .call(move |book| book.join_organization(org_id, user_id))
            .await
        {
            Ok(org) => {
                tracing::info!(user_id, org_id = %org.id, "joined organization");
                self.ctx.say(ev.chat_id, replies::JOINED).await;
                self.ctx.say(ev.chat_id, replies::MENU_HINT).await;
                Ok(())
            }
            Err(CallError::Domain(LunchError::OrganizationNotFound(_))) => {
                self.ctx.say(ev.chat_id, replies::UNKNOWN_ORGANIZATION).await;
                self.ctx.arm(ev, AwaitAction::AwaitJoinId, "");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn save_profile(&self, ev: &InboundEvent, carried: &str) -> Result<(), CallError> {
        let (first, last) = carried
            .split_once(CARRY_SEPARATOR)
            .unwrap_or((carried, ""));
        let (first, last) = (first.to_string(), last.to_string());
        let middle = match ev.text.trim() {
            "" | "-" => None,
            m => Some(m.to_string()),
        };
        let user_id = ev.sender_id;
        let user = self
            .ctx
            .call(move |book| book.set_full_name(user_id, &first, &last, middle.as_deref()))
            .await?;
        let reply = replies::profile_saved(
            &user.first_name,
            user.last_name.as_deref().unwrap_or_default(),
            user.middle_name.as_deref(),
        );
        self.ctx.say(ev.chat_id, reply).await;
        Ok(())
    }
}

fn order_buttons() -> [String; 2] {
    [CONFIRM_ORDER.to_string(), CLEAR_ORDER.to_string()]
}

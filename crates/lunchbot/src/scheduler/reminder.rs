use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use lunchbot_core::clock::Clock;
use lunchbot_core::config::Config;
use lunchbot_core::lunch_time::reminder_buckets;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::report;
use tokio::sync::watch;

use super::{align_then_run, Timing};
use crate::bounded::{send, store_call};
use crate::gateway::{Gateway, OutgoingMessage};

/// Nudges members who have not confirmed an order yet, twice per lunch
/// time: `first` and `second` minutes before the shipment cutoff.
///
/// There is no per-user dedup; a user whose organization matches a bucket is
/// reminded on every tick that computes that bucket until they confirm.
pub struct ReminderDispatcher<G> {
    book: Arc<OrderBook>,
    gateway: Arc<G>,
    timing: Timing,
    first: Duration,
    second: Duration,
}

impl<G: Gateway> ReminderDispatcher<G> {
    pub fn new(book: Arc<OrderBook>, gateway: Arc<G>, cfg: &Config) -> Self {
        Self {
            book,
            gateway,
            timing: Timing::from_config(cfg),
            first: cfg.first_reminder(),
            second: cfg.second_reminder(),
        }
    }

    pub async fn run(
        self,
        clock: Arc<dyn Clock>,
        starting_minutes: Vec<u32>,
        tick_interval: StdDuration,
        shutdown: watch::Receiver<bool>,
    ) {
        align_then_run(
            "reminder",
            clock,
            &starting_minutes,
            tick_interval,
            shutdown,
            |now| self.tick(now),
        )
        .await;
    }

    pub async fn tick(&self, now: DateTime<Utc>) {
        let local = self.timing.local(now);
        let (first, second) =
            reminder_buckets(local, self.timing.ship_offset, self.first, self.second);
        tracing::debug!(%first, %second, "reminder buckets");

        let book = Arc::clone(&self.book);
        let date = local.date();
        let by_lunch =
            match store_call(move || book.unconfirmed_users_by_lunch_times(&[first, second], date))
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::error!(error = %e, "reminder lookup failed");
                    return;
                }
            };

        for (lunch, users) in by_lunch {
            let minutes_left = if lunch == first {
                self.first.num_minutes()
            } else {
                self.second.num_minutes()
            };
            let text = report::reminder_message(minutes_left);
            for user in users {
                let msg = OutgoingMessage::text(user.chat_id, text.clone());
                if let Err(e) = send(&*self.gateway, msg).await {
                    tracing::warn!(user_id = user.id, error = %e, "reminder not delivered");
                }
            }
        }
    }
}

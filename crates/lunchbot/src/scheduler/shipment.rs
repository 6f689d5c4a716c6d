use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use lunchbot_core::clock::Clock;
use lunchbot_core::config::Config;
use lunchbot_core::lunch_time::shipment_bucket;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::report;
use tokio::sync::watch;

use super::{align_then_run, Timing};
use crate::bounded::{send, store_call};
use crate::gateway::{Gateway, OutgoingMessage};

/// Sends the consolidated order of every organization whose lunch time is
/// due to the admin chat, followed by the combined total.
pub struct ShipmentDispatcher<G> {
    book: Arc<OrderBook>,
    gateway: Arc<G>,
    timing: Timing,
    admin_chat_id: i64,
}

impl<G: Gateway> ShipmentDispatcher<G> {
    pub fn new(book: Arc<OrderBook>, gateway: Arc<G>, cfg: &Config) -> Self {
        Self {
            book,
            gateway,
            timing: Timing::from_config(cfg),
            admin_chat_id: cfg.admin_chat_id,
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
            "shipment",
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
        let bucket = shipment_bucket(local, self.timing.ship_offset);
        let date = local.date();

        let book = Arc::clone(&self.book);
        let orders = match store_call(move || book.aggregate_by_bucket(bucket, date)).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(%bucket, error = %e, "shipment aggregation failed");
                return;
            }
        };
        if orders.is_empty() {
            tracing::debug!(%bucket, "nothing to ship");
            return;
        }
        tracing::info!(%bucket, organizations = orders.len(), "shipping orders");

        let messages = [
            report::shipment_message(bucket, &orders),
            report::grand_total_message(&orders),
        ];
        for text in messages {
            if let Err(e) = send(&*self.gateway, OutgoingMessage::text(self.admin_chat_id, text)).await
            {
                tracing::error!(%bucket, error = %e, "shipment message not delivered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, utc_for_local, Harness, ADMIN_CHAT};

    fn dispatcher(h: &Harness) -> ShipmentDispatcher<crate::gateway::RecordingGateway> {
        ShipmentDispatcher::new(Arc::clone(&h.book), Arc::clone(&h.gateway), &config())
    }

    #[tokio::test]
    async fn ships_confirmed_orders_of_the_due_bucket() {
        let h = Harness::at_local(10, 0);
        let alpha = h.org("Alpha", "12:30", &[1, 2]);
        h.org("Beta", "12:30", &[3]);
        h.org("Later", "13:00", &[4]);
        h.book
            .set_organization_address(alpha.id, "1 Main St")
            .unwrap();
        h.confirmed(1, &[("Soup", 150.0), ("Tea", 50.0)]);
        h.confirmed(2, &[("Soup", 150.0)]);
        h.confirmed(3, &[("Tea", 50.0), ("Tea", 50.0)]);
        h.confirmed(4, &[("Soup", 150.0)]);
        // Drafts never ship.
        h.book
            .add_dish(2, lunchbot_core::types::Dish::new("Cake", 999.0, "Main"))
            .unwrap();

        dispatcher(&h).tick(utc_for_local(12, 15, 0)).await;

        let texts = h.gateway.texts_to(ADMIN_CHAT);
        assert_eq!(texts.len(), 2, "{texts:?}");
        let shipment = &texts[0];
        assert!(shipment.starts_with("Orders for 12:30"));
        assert!(shipment.contains("Alpha\n1 Main St"));
        assert!(shipment.contains("Beta\n(no address)"));
        assert!(shipment.contains("Organization total: 350.00"));
        assert!(shipment.contains("Organization total: 100.00"));
        assert!(!shipment.contains("Later"));
        assert!(!shipment.contains("Cake"));

        let total = &texts[1];
        assert!(total.contains("Soup - 2"));
        assert!(total.contains("Tea - 3"));
        assert!(total.ends_with("Total amount: 450.00"));
    }

    #[tokio::test]
    async fn no_orders_sends_nothing() {
        let h = Harness::at_local(10, 0);
        h.org("Alpha", "12:30", &[1]);
        dispatcher(&h).tick(utc_for_local(12, 15, 0)).await;
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn bucket_ignores_seconds() {
        let h = Harness::at_local(10, 0);
        h.org("Alpha", "12:30", &[1]);
        h.confirmed(1, &[("Soup", 500.0)]);
        dispatcher(&h).tick(utc_for_local(12, 15, 59)).await;
        let texts = h.gateway.texts_to(ADMIN_CHAT);
        assert_eq!(texts.len(), 2);
        assert!(texts[1].ends_with("Total amount: 500.00"));
    }

    #[tokio::test]
    async fn failed_shipment_send_still_delivers_the_total() {
        let h = Harness::at_local(10, 0);
        h.org("Alpha", "12:30", &[1]);
        h.confirmed(1, &[("Soup", 500.0)]);
        h.gateway.fail_next(1);
        let d = dispatcher(&h);
        d.tick(utc_for_local(12, 15, 0)).await;

        let texts = h.gateway.texts_to(ADMIN_CHAT);
        assert_eq!(texts.len(), 1, "{texts:?}");
        assert!(texts[0].starts_with("Combined order"));
        assert!(texts[0].ends_with("Total amount: 500.00"));

        // The dispatcher keeps working: the same bucket ships again on the
        // next tick within that minute.
        d.tick(utc_for_local(12, 15, 30)).await;
        let texts = h.gateway.texts_to(ADMIN_CHAT);
        assert_eq!(texts.len(), 3, "{texts:?}");
        assert!(texts[1].starts_with("Orders for 12:30"));
    }
}

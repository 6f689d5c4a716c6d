use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use lunchbot_core::clock::Clock;
use lunchbot_core::config::Config;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::report;
use tokio::sync::watch;

use super::{align_then_run, Timing};
use crate::bounded::{send, store_call};
use crate::gateway::{Gateway, OutgoingMessage};

/// Runs on the hour; statistics go out once a day at `report_hour`.
pub const STATISTICS_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// Daily spend per organization, plus a monthly summary on the first day of
/// each month, sent to the configured receivers.
pub struct StatisticsDispatcher<G> {
    book: Arc<OrderBook>,
    gateway: Arc<G>,
    timing: Timing,
    report_hour: u32,
    receivers: Vec<i64>,
}

impl<G: Gateway> StatisticsDispatcher<G> {
    pub fn new(book: Arc<OrderBook>, gateway: Arc<G>, cfg: &Config) -> Self {
        Self {
            book,
            gateway,
            timing: Timing::from_config(cfg),
            report_hour: cfg.statistics.report_hour,
            receivers: cfg.statistics.receivers.clone(),
        }
    }

    pub async fn run(self, clock: Arc<dyn Clock>, shutdown: watch::Receiver<bool>) {
        align_then_run(
            "statistics",
            clock,
            &[0],
            STATISTICS_INTERVAL,
            shutdown,
            |now| self.tick(now),
        )
        .await;
    }

    pub async fn tick(&self, now: DateTime<Utc>) {
        let local = self.timing.local(now);
        if local.hour() != self.report_hour {
            return;
        }
        let today = local.date();
        let Some(yesterday) = today.pred_opt() else {
            return;
        };

        let book = Arc::clone(&self.book);
        match store_call(move || book.aggregate_amount_by_date(yesterday)).await {
            Ok(amounts) => {
                self.broadcast(report::daily_report(yesterday, &amounts))
                    .await
            }
            Err(e) => tracing::error!(day = %yesterday, error = %e, "daily statistics failed"),
        }

        if today.day() == 1 {
            let (from, to) = report::previous_month(today);
            let book = Arc::clone(&self.book);
            match store_call(move || book.aggregate_amount_between(from, to)).await {
                Ok(amounts) => self.broadcast(report::monthly_report(from, &amounts)).await,
                Err(e) => tracing::error!(%from, %to, error = %e, "monthly statistics failed"),
            }
        }
    }

    async fn broadcast(&self, text: String) {
        for &chat_id in &self.receivers {
            if let Err(e) = send(&*self.gateway, OutgoingMessage::text(chat_id, text.clone())).await {
                tracing::warn!(chat_id, error = %e, "statistics not delivered");
            }
        }
    }
}

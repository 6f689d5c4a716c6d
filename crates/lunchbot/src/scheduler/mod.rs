//! Time-aligned background dispatchers.
//!
//! Each dispatcher recomputes its bucket from the wall clock on every tick
//! and keeps no state between ticks. A failed tick is logged and abandoned;
//! the next tick starts fresh.

pub mod aligner;
pub mod reminder;
pub mod shipment;
pub mod statistics;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use lunchbot_core::config::Config;
use lunchbot_core::lunch_time::local_now;

pub use aligner::align_then_run;
pub use reminder::ReminderDispatcher;
pub use shipment::ShipmentDispatcher;
pub use statistics::StatisticsDispatcher;

/// Offsets shared by the bucket computations.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub timezone_offset: Duration,
    pub ship_offset: Duration,
}

impl Timing {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timezone_offset: cfg.timezone_offset(),
            ship_offset: cfg.ship_offset(),
        }
    }

    pub fn local(&self, now_utc: DateTime<Utc>) -> NaiveDateTime {
        local_now(now_utc, self.timezone_offset)
    }
}

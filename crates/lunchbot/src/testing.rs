//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use lunchbot_core::clock::ManualClock;
use lunchbot_core::config::{Config, DishConfig, MenuConfig, StatisticsConfig};
use lunchbot_core::lunch_time::LunchTime;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::store::Store;
use lunchbot_core::types::{Dish, Organization};
use tempfile::TempDir;

use crate::gateway::RecordingGateway;

pub(crate) fn tz() -> Duration {
    Duration::hours(3)
}

pub(crate) fn ship() -> Duration {
    Duration::minutes(15)
}

/// Local date every fixture runs on.
pub(crate) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
}

/// UTC instant of local wall time `h:m:s` on [`day`].
pub(crate) fn utc_for_local(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    utc_for_local_on(day(), h, m, s)
}

pub(crate) fn utc_for_local_on(date: NaiveDate, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    date.and_hms_opt(h, m, s).unwrap().and_utc() - tz()
}

pub(crate) const ADMIN_CHAT: i64 = -100;
pub(crate) const RECEIVER: i64 = 900;

fn dish(name: &str, price: f64, category: &str) -> DishConfig {
    DishConfig {
        name: name.to_string(),
        price,
        category: category.to_string(),
    }
}

/// Configuration matching [`Harness`]: UTC+3, 15 minute shipping offset,
/// lunch window 11:00 to 16:00, two categories of two dishes each.
pub(crate) fn config() -> Config {
    Config {
        timezone_offset_minutes: 180,
        ship_before_lunch_minutes: 15,
        admin_chat_id: ADMIN_CHAT,
        statistics: StatisticsConfig {
            report_hour: 9,
            receivers: vec![RECEIVER],
        },
        menu: MenuConfig {
            categories: vec!["Soups".to_string(), "Drinks".to_string()],
            dishes: vec![
                dish("Borscht", 150.0, "Soups"),
                dish("Solyanka", 180.0, "Soups"),
                dish("Tea", 20.0, "Drinks"),
                dish("Compote", 30.0, "Drinks"),
            ],
        },
        ..Config::default()
    }
}

pub(crate) struct Harness {
    _dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub book: Arc<OrderBook>,
    pub gateway: Arc<RecordingGateway>,
}

impl Harness {
    /// Bot at UTC+3, shipping 15 minutes before lunch, local time `h:m`.
    pub fn at_local(h: u32, m: u32) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("lunch.redb")).unwrap());
        let clock = Arc::new(ManualClock::new(utc_for_local(h, m, 0)));
        let book = Arc::new(OrderBook::new(store, clock.clone(), tz(), ship()));
        Self {
            _dir: dir,
            clock,
            book,
            gateway: Arc::new(RecordingGateway::new()),
        }
    }

    pub fn set_local(&self, h: u32, m: u32, s: u32) {
        self.clock.set(utc_for_local(h, m, s));
    }

    /// Register `members` (user id == chat id) and put them in a new
    /// organization.
    pub fn org(&self, name: &str, lunch: &str, members: &[i64]) -> Organization {
        let lunch: LunchTime = lunch.parse().unwrap();
        let org = self.book.add_organization(name, lunch, None).unwrap();
        for &id in members {
            self.book.register_user(id, id, "member").unwrap();
            self.book.join_organization(org.id, id).unwrap();
        }
        org
    }

    /// Add and confirm one order of `dishes` for `user`.
    pub fn confirmed(&self, user: i64, dishes: &[(&str, f64)]) {
        for (name, price) in dishes {
            self.book
                .add_dish(user, Dish::new(*name, *price, "Main"))
                .unwrap();
        }
        self.book.confirm_order(user).unwrap();
    }
}

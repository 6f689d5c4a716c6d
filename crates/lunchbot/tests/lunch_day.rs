//! A full lunch day through the public wiring: dialogs on the inbound
//! channels, reminders and the shipment from the aligned dispatchers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use lunchbot::gateway::{InboundEvent, RecordingGateway};
use lunchbot::runtime::{Services, INBOUND_QUEUE};
use lunchbot_core::clock::ManualClock;
use lunchbot_core::config::{Config, DishConfig, MenuConfig};
use lunchbot_core::store::Store;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

const ADMIN_CHAT: i64 = -500;
const ALICE: i64 = 11;
const BOB: i64 = 12;

/// Local wall time on 2024-03-14 at UTC+2.
fn local(h: u32, m: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2024, 3, 14)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
        .and_utc()
        - chrono::Duration::hours(2)
}

fn config() -> Config {
    Config {
        timezone_offset_minutes: 120,
        ship_before_lunch_minutes: 30,
        // Tick every second so the test does not wait for whole minutes.
        tick_interval_secs: 1,
        admin_chat_id: ADMIN_CHAT,
        menu: MenuConfig {
            categories: vec!["Mains".to_string()],
            dishes: vec![
                DishConfig {
                    name: "Plov".to_string(),
                    price: 300.0,
                    category: "Mains".to_string(),
                },
                DishConfig {
                    name: "Salad".to_string(),
                    price: 200.0,
                    category: "Mains".to_string(),
                },
            ],
        },
        ..Config::default()
    }
}

struct Bot {
    _dir: TempDir,
    clock: Arc<ManualClock>,
    gateway: Arc<RecordingGateway>,
    users: mpsc::Sender<InboundEvent>,
    stop: watch::Sender<bool>,
    tasks: JoinSet<()>,
    next_id: i64,
}

impl Bot {
    fn start() -> Self {
        let cfg = config();
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("lunch.redb")).unwrap());
        let clock = Arc::new(ManualClock::new(local(10, 0)));
        let gateway = Arc::new(RecordingGateway::new());
        let services = Services::new(&cfg, store, Arc::clone(&gateway), clock.clone());

        let (users, users_rx) = mpsc::channel(INBOUND_QUEUE);
        let (_admin, admin_rx) = mpsc::channel(INBOUND_QUEUE);
        let (stop, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        services.spawn(&cfg, users_rx, admin_rx, &stop_rx, &mut tasks);

        Self {
            _dir: dir,
            clock,
            gateway,
            users,
            stop,
            tasks,
            next_id: 1,
        }
    }

    async fn say(&mut self, user: i64, text: &str) {
        let event = InboundEvent {
            sender_id: user,
            chat_id: user,
            message_id: self.next_id,
            text: text.to_string(),
            is_command: text.starts_with('/'),
            first_name: "Tester".to_string(),
        };
        self.next_id += 2;
        let before = self.gateway.sent_to(user).len();
        self.users.send(event).await.unwrap();
        self.wait_for(user, |texts| texts.len() > before).await;
    }

    /// Poll until `done` holds for the texts sent to `chat`.
    async fn wait_for(&self, chat: i64, done: impl Fn(&[String]) -> bool) -> Vec<String> {
        for _ in 0..500 {
            let texts = self.gateway.texts_to(chat);
            if done(&texts) {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out; chat {chat} got {:?}", self.gateway.texts_to(chat));
    }

    async fn stop(mut self) {
        self.stop.send(true).unwrap();
        while let Some(joined) = self.tasks.join_next().await {
            joined.unwrap();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn orders_are_reminded_and_shipped() {
    let mut bot = Bot::start();

    bot.say(ALICE, "/register").await;
    bot.say(ALICE, "/create").await;
    bot.say(ALICE, "Initech 13:00").await;
    let is_id = |t: &String| t.parse::<uuid::Uuid>().is_ok();
    let created = bot.wait_for(ALICE, |t| t.iter().any(is_id)).await;
    let org_id = created.into_iter().find(is_id).unwrap();
    bot.say(ALICE, "4 Office Park").await;

    bot.say(BOB, "/register").await;
    bot.say(BOB, "/join").await;
    bot.say(BOB, &org_id).await;

    bot.say(ALICE, "Plov - 300.00").await;
    bot.say(ALICE, "Confirm order").await;
    bot.say(BOB, "Salad - 200.00").await;

    // 12:00 + 30 minutes shipping + 30 minutes first reminder = 13:00.
    bot.clock.set(local(12, 0));
    bot.wait_for(BOB, |t| {
        t.iter().any(|m| m == "30 minutes left to confirm your order")
    })
    .await;
    assert!(!bot
        .gateway
        .texts_to(ALICE)
        .iter()
        .any(|m| m.contains("minutes left")));

    bot.say(BOB, "Confirm order").await;
    bot.wait_for(BOB, |t| t.iter().any(|m| m.starts_with("Your order is confirmed")))
        .await;

    // 12:30 + 30 minutes shipping = 13:00.
    bot.clock.set(local(12, 30));
    let admin = bot
        .wait_for(ADMIN_CHAT, |t| t.iter().any(|m| m.starts_with("Combined order")))
        .await;
    let shipment = admin
        .iter()
        .find(|m| m.starts_with("Orders for 13:00"))
        .expect("shipment precedes the combined total");
    assert!(shipment.contains("Initech\n4 Office Park"));
    assert!(shipment.contains("Organization total: 500.00"));
    let total = admin
        .iter()
        .find(|m| m.starts_with("Combined order"))
        .unwrap();
    assert!(total.contains("Plov - 1"));
    assert!(total.contains("Salad - 1"));
    assert!(total.ends_with("Total amount: 500.00"));

    // One minute later the cutoff has passed.
    bot.clock.set(local(12, 31));
    bot.say(BOB, "Plov - 300.00").await;
    assert!(bot
        .gateway
        .texts_to(BOB)
        .last()
        .unwrap()
        .starts_with("Sorry, lunch time has passed"));

    bot.stop().await;
}

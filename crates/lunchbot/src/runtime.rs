//! Process wiring: open the store, start every task, stop them on a signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use lunchbot_core::clock::{Clock, SystemClock};
use lunchbot_core::config::{Config, WarnLevel};
use lunchbot_core::conversation::ConversationStore;
use lunchbot_core::menu::Menu;
use lunchbot_core::orders::OrderBook;
use lunchbot_core::store::Store;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::gateway::telegram::route_updates;
use crate::gateway::{Gateway, InboundEvent, TelegramGateway};
use crate::inbound::{AdminLoop, Context, UserLoop};
use crate::scheduler::{ReminderDispatcher, ShipmentDispatcher, StatisticsDispatcher};
use crate::shutdown::os_signal;
use crate::health;

/// How long running tasks get to finish after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Capacity of each inbound channel between the update router and a loop.
pub const INBOUND_QUEUE: usize = 64;

/// Shared state every task is built from.
pub struct Services<G> {
    pub book: Arc<OrderBook>,
    pub menu: Arc<Menu>,
    pub conversations: Arc<ConversationStore>,
    pub gateway: Arc<G>,
    pub clock: Arc<dyn Clock>,
}

impl<G: Gateway> Services<G> {
    pub fn new(cfg: &Config, store: Arc<Store>, gateway: Arc<G>, clock: Arc<dyn Clock>) -> Self {
        let book = Arc::new(OrderBook::new(
            store,
            Arc::clone(&clock),
            cfg.timezone_offset(),
            cfg.ship_offset(),
        ));
        Self {
            book,
            menu: Arc::new(Menu::from_config(&cfg.menu)),
            conversations: Arc::new(ConversationStore::new()),
            gateway,
            clock,
        }
    }

    /// Spawn the user and admin loops and the three dispatchers onto `tasks`.
    pub fn spawn(
        &self,
        cfg: &Config,
        users: mpsc::Receiver<InboundEvent>,
        admin: mpsc::Receiver<InboundEvent>,
        shutdown: &watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) {
        let ctx = Context::new(
            Arc::clone(&self.book),
            Arc::clone(&self.menu),
            Arc::clone(&self.conversations),
            Arc::clone(&self.gateway),
            cfg,
        );
        tasks.spawn(UserLoop::new(ctx.clone()).run(users, shutdown.clone()));
        tasks.spawn(AdminLoop::new(ctx, cfg.admin_chat_id).run(admin, shutdown.clone()));

        let reminder =
            ReminderDispatcher::new(Arc::clone(&self.book), Arc::clone(&self.gateway), cfg);
        tasks.spawn(reminder.run(
            Arc::clone(&self.clock),
            cfg.starting_minutes.clone(),
            cfg.tick_interval(),
            shutdown.clone(),
        ));

        let shipment =
            ShipmentDispatcher::new(Arc::clone(&self.book), Arc::clone(&self.gateway), cfg);
        tasks.spawn(shipment.run(
            Arc::clone(&self.clock),
            cfg.starting_minutes.clone(),
            cfg.tick_interval(),
            shutdown.clone(),
        ));

        let statistics =
            StatisticsDispatcher::new(Arc::clone(&self.book), Arc::clone(&self.gateway), cfg);
        tasks.spawn(statistics.run(Arc::clone(&self.clock), shutdown.clone()));
    }
}

/// Log every configuration warning; fail if any of them is an error.
pub fn check_config(cfg: &Config) -> anyhow::Result<()> {
    let mut errors = 0;
    for w in cfg.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => {
                errors += 1;
                tracing::error!("config: {}", w.message);
            }
        }
    }
    if errors > 0 {
        bail!("configuration has {errors} error(s)");
    }
    Ok(())
}

/// Run the bot until SIGINT or SIGTERM.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    check_config(&cfg)?;

    let store = Store::open(&cfg.database_path)
        .with_context(|| format!("opening database {}", cfg.database_path.display()))?;
    let client = telegram_client::Client::new(&cfg.telegram.api_url, &cfg.telegram.token);
    let gateway = Arc::new(TelegramGateway::new(client.clone()));
    let services = Services::new(&cfg, Arc::new(store), gateway, Arc::new(SystemClock));

    let (stop_tx, stop_rx) = watch::channel(false);
    let (users_tx, users_rx) = mpsc::channel(INBOUND_QUEUE);
    let (admin_tx, admin_rx) = mpsc::channel(INBOUND_QUEUE);
    let mut tasks = JoinSet::new();

    let updates = telegram_client::poll(client, cfg.telegram.poll_timeout_secs);
    tasks.spawn(route_updates(
        updates,
        cfg.admin_chat_id,
        users_tx,
        admin_tx,
        stop_rx.clone(),
    ));
    services.spawn(&cfg, users_rx, admin_rx, &stop_rx, &mut tasks);

    let port = cfg.health_port;
    let health_stop = stop_rx.clone();
    tasks.spawn(async move {
        if let Err(e) = health::serve(port, health_stop).await {
            tracing::error!(port, error = %e, "health endpoint failed");
        }
    });

    tracing::info!(
        admin_chat_id = cfg.admin_chat_id,
        database = %cfg.database_path.display(),
        "lunchbot running"
    );
    os_signal().await;
    tracing::info!("shutdown requested");
    let _ = stop_tx.send(true);

    let drain = async { while tasks.join_next().await.is_some() {} };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!(remaining = tasks.len(), "tasks still running after grace period; aborting");
        tasks.abort_all();
    }
    tracing::info!("lunchbot stopped");
    Ok(())
}

//! The lunchbot daemon.
//!
//! Wires the order book from `lunchbot-core` to Telegram: inbound dialogs
//! for users and the admin chat, and wall-clock aligned dispatchers for
//! reminders, shipments and statistics.

pub mod bounded;
pub mod gateway;
pub mod health;
pub mod inbound;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;

#[cfg(test)]
mod testing;

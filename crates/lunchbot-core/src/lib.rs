pub mod clock;
pub mod config;
pub mod conversation;
pub mod error;
pub mod lunch_time;
pub mod menu;
pub mod orders;
pub mod report;
pub mod store;
pub mod types;

pub use error::{LunchError, Result};

//! Dish catalog loaded from configuration.
//!
//! The catalog itself is fixed for the life of the process; the admin can
//! only stop and re-activate dishes. Stopped dishes are hidden from users and
//! cannot be ordered.

use std::collections::HashSet;
use std::sync::RwLock;

use crate::config::MenuConfig;
use crate::types::Dish;

#[derive(Debug)]
pub struct Menu {
    categories: Vec<String>,
    dishes: Vec<Dish>,
    /// Names of stopped dishes.
    stopped: RwLock<HashSet<String>>,
}

impl Menu {
    pub fn from_config(cfg: &MenuConfig) -> Self {
        let dishes = cfg
            .dishes
            .iter()
            .map(|d| Dish::new(d.name.clone(), d.price, d.category.clone()))
            .collect();
        Self {
            categories: cfg.categories.clone(),
            dishes,
            stopped: RwLock::new(HashSet::new()),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_category(&self, text: &str) -> bool {
        self.categories.iter().any(|c| c == text)
    }

    pub fn is_stopped(&self, dish: &Dish) -> bool {
        self.stopped
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&dish.name)
    }

    /// Dishes of `category` that users can order.
    pub fn active_dishes(&self, category: &str) -> Vec<Dish> {
        self.in_category(category, false)
    }

    pub fn stopped_dishes(&self, category: &str) -> Vec<Dish> {
        self.in_category(category, true)
    }

    fn in_category(&self, category: &str, stopped: bool) -> Vec<Dish> {
        let set = self.stopped.read().unwrap_or_else(|e| e.into_inner());
        self.dishes
            .iter()
            .filter(|d| d.category == category && set.contains(&d.name) == stopped)
            .cloned()
            .collect()
    }

    /// Look up a dish by its button label, stopped or not.
    pub fn find(&self, label: &str) -> Option<Dish> {
        self.dishes.iter().find(|d| d.label() == label).cloned()
    }

    /// Mark a dish stopped (or active again). Returns the dish if the label
    /// matched anything.
    pub fn set_stopped(&self, label: &str, stopped: bool) -> Option<Dish> {
        let dish = self.find(label)?;
        let mut set = self.stopped.write().unwrap_or_else(|e| e.into_inner());
        if stopped {
            set.insert(dish.name.clone());
        } else {
            set.remove(&dish.name);
        }
        tracing::info!(dish = %dish.name, stopped, "dish availability changed");
        Some(dish)
    }
}

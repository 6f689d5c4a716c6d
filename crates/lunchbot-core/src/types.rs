use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lunch_time::LunchTime;

// ---------------------------------------------------------------------------
// Dish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    pub price: f64,
    pub category: String,
}

impl Dish {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            category: category.into(),
        }
    }

    /// Button label; also the text the chat client sends back when tapped.
    pub fn label(&self) -> String {
        format!("{} - {:.2}", self.name, self.price)
    }
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One dish line of a user's order for a given date.
///
/// Lifecycle: inserted as a draft (`confirmed = false`), confirmed by the
/// user, then either read by the shipment aggregation or deleted by a clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: i64,
    pub date: NaiveDate,
    pub dish: Dish,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn draft(user_id: i64, date: NaiveDate, dish: Dish) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            date,
            dish,
            confirmed: false,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Organization / User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub lunch_time: LunchTime,
    /// User who created it; `None` when created from the admin chat.
    #[serde(default)]
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, lunch_time: LunchTime, owner_id: Option<i64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: None,
            lunch_time,
            owner_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Chat platform user id.
    pub id: i64,
    pub chat_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub organization_id: Option<Uuid>,
    pub registered_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: i64, chat_id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            chat_id,
            first_name: first_name.into(),
            last_name: None,
            middle_name: None,
            organization_id: None,
            registered_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DishCount {
    pub dish: Dish,
    pub count: u32,
}

impl DishCount {
    pub fn amount(&self) -> f64 {
        self.dish.price * f64::from(self.count)
    }
}

/// Confirmed orders of one organization for one shipment, grouped by dish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationOrders {
    pub organization: Organization,
    /// Sorted by category, then dish name.
    pub dishes: Vec<DishCount>,
}

impl OrganizationOrders {
    pub fn amount(&self) -> f64 {
        self.dishes.iter().map(DishCount::amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationAmount {
    pub organization_id: Uuid,
    pub organization_name: String,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dish_label_has_two_decimals() {
        let d = Dish::new("Borscht", 4.5, "Soups");
        assert_eq!(d.label(), "Borscht - 4.50");
    }

    #[test]
    fn organization_amount_is_price_times_count() {
        let org = Organization::new("Acme", LunchTime::new(12, 30).unwrap(), None);
        let orders = OrganizationOrders {
            organization: org,
            dishes: vec![
                DishCount {
                    dish: Dish::new("Soup", 150.0, "Soups"),
                    count: 2,
                },
                DishCount {
                    dish: Dish::new("Tea", 20.0, "Drinks"),
                    count: 1,
                },
            ],
        };
        assert!((orders.amount() - 320.0).abs() < f64::EPSILON);
    }
}

//! Text of the messages the dispatchers send.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{Datelike, Month, NaiveDate};
use uuid::Uuid;

use crate::lunch_time::LunchTime;
use crate::types::{OrganizationAmount, OrganizationOrders};

/// Consolidated shipment for the admin chat: one section per organization
/// with its address, dish counts and sum.
pub fn shipment_message(bucket: LunchTime, orders: &BTreeMap<Uuid, OrganizationOrders>) -> String {
    let mut sections: Vec<&OrganizationOrders> = orders.values().collect();
    sections.sort_by(|a, b| a.organization.name.cmp(&b.organization.name));

    let mut msg = format!("Orders for {bucket}\n\n");
    for org in sections {
        let _ = writeln!(msg, "{}", org.organization.name);
        let _ = writeln!(
            msg,
            "{}",
            org.organization.address.as_deref().unwrap_or("(no address)")
        );
        for line in &org.dishes {
            let _ = writeln!(msg, "{} - {}", line.dish.name, line.count);
        }
        let _ = writeln!(msg, "Organization total: {:.2}\n", org.amount());
    }
    msg.trim_end().to_string()
}

/// Dish counts summed over all organizations of the shipment, plus the
/// grand total amount.
pub fn grand_total_message(orders: &BTreeMap<Uuid, OrganizationOrders>) -> String {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for line in orders.values().flat_map(|o| o.dishes.iter()) {
        *counts.entry(line.dish.name.as_str()).or_default() += line.count;
    }
    let total: f64 = orders.values().map(OrganizationOrders::amount).sum();

    let mut msg = String::from("Combined order for all organizations\n");
    for (dish, count) in counts {
        let _ = writeln!(msg, "{dish} - {count}");
    }
    let _ = write!(msg, "Total amount: {total:.2}");
    msg
}

pub fn reminder_message(minutes_left: i64) -> String {
    format!("{minutes_left} minutes left to confirm your order")
}

pub fn daily_report(day: NaiveDate, amounts: &[OrganizationAmount]) -> String {
    let header = format!("Report for {} {}", month_name(day), day.day());
    amounts_report(&header, amounts)
}

/// `month` is any date inside the reported month.
pub fn monthly_report(month: NaiveDate, amounts: &[OrganizationAmount]) -> String {
    let header = format!("Report for {} {}", month_name(month), month.year());
    amounts_report(&header, amounts)
}

fn amounts_report(header: &str, amounts: &[OrganizationAmount]) -> String {
    let mut msg = format!("{header}\n");
    for a in amounts {
        let _ = writeln!(msg, "{} - {:.2}", a.organization_name, a.amount);
    }
    let total: f64 = amounts.iter().map(|a| a.amount).sum();
    let _ = write!(msg, "\nTotal: {total:.2}");
    msg
}

fn month_name(date: NaiveDate) -> &'static str {
    u8::try_from(date.month())
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("")
}

/// First and last day of the month before the one containing `today`.
pub fn previous_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_of_this = today.with_day(1).unwrap_or(today);
    let last = first_of_this.pred_opt().unwrap_or(first_of_this);
    let first = last.with_day(1).unwrap_or(last);
    (first, last)
}

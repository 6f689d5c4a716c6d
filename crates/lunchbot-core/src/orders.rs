//! Order lifecycle with the lunch-deadline cutoff.
//!
//! An order may change while `now + ship_offset <= organization.lunch_time`,
//! with `now` taken in the bot's timezone and truncated to the minute. The
//! cutoff is computed here; the comparison runs inside the store's write
//! transaction so that it cannot race with the mutation it guards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{LunchError, Result};
use crate::lunch_time::{change_cutoff, local_now, LunchTime};
use crate::store::Store;
use crate::types::{Dish, Order, Organization, OrganizationAmount, OrganizationOrders, User};

pub struct OrderBook {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    timezone_offset: Duration,
    ship_offset: Duration,
}

impl OrderBook {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        timezone_offset: Duration,
        ship_offset: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            timezone_offset,
            ship_offset,
        }
    }

    pub fn local_now(&self) -> NaiveDateTime {
        local_now(self.clock.now_utc(), self.timezone_offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }

    /// Latest lunch time that can still be changed right now; `None` once
    /// the cutoff has moved past midnight and nothing of today can change.
    pub fn cutoff(&self) -> Option<LunchTime> {
        change_cutoff(self.local_now(), self.ship_offset)
    }

    /// Add a draft line for today. `DeadlineExceeded` if the user's
    /// organization is past its cutoff; nothing is written in that case.
    pub fn add_dish(&self, user_id: i64, dish: Dish) -> Result<Order> {
        let today = self.today();
        let cutoff = self.cutoff();
        let order = self
            .store
            .add_order_before_cutoff(user_id, today, dish, cutoff)?;
        tracing::debug!(user_id, dish = %order.dish, ?cutoff, "dish added");
        Ok(order)
    }

    /// Confirm today's draft lines. Not deadline-guarded.
    pub fn confirm_order(&self, user_id: i64) -> Result<usize> {
        self.store.confirm_orders(user_id, self.today())
    }

    /// Discard a draft unconditionally.
    pub fn clear_orders(&self, user_id: i64, date: NaiveDate) -> Result<usize> {
        self.store.delete_orders(user_id, date)
    }

    /// Cancel an order, refused once the organization's cutoff has passed.
    pub fn clear_orders_with_deadline_check(&self, user_id: i64, date: NaiveDate) -> Result<usize> {
        self.store
            .delete_orders_before_cutoff(user_id, date, self.cutoff())
    }

    /// Confirmed lines placed on `date` by organizations whose lunch time is
    /// exactly `bucket`.
    pub fn aggregate_by_bucket(
        &self,
        bucket: LunchTime,
        date: NaiveDate,
    ) -> Result<BTreeMap<Uuid, OrganizationOrders>> {
        self.store.aggregate_by_bucket(bucket, date)
    }

    pub fn aggregate_amount_by_date(&self, date: NaiveDate) -> Result<Vec<OrganizationAmount>> {
        self.store.aggregate_amount_between(date, date)
    }

    pub fn aggregate_amount_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<OrganizationAmount>> {
        self.store.aggregate_amount_between(from, to)
    }

    pub fn has_any_orders(&self, user_id: i64) -> Result<bool> {
        Ok(!self.store.orders_for_user(user_id, self.today())?.is_empty())
    }

    pub fn has_confirmed_order(&self, user_id: i64) -> Result<bool> {
        Ok(self
            .store
            .orders_for_user(user_id, self.today())?
            .iter()
            .any(|o| o.confirmed))
    }

    /// Dishes on today's order, oldest first.
    pub fn user_dishes(&self, user_id: i64) -> Result<Vec<Dish>> {
        Ok(self
            .store
            .orders_for_user(user_id, self.today())?
            .into_iter()
            .map(|o| o.dish)
            .collect())
    }

    /// Members of organizations with one of `lunch_times` who have no
    /// confirmed order on `date`.
    pub fn unconfirmed_users_by_lunch_times(
        &self,
        lunch_times: &[LunchTime],
        date: NaiveDate,
    ) -> Result<HashMap<LunchTime, Vec<User>>> {
        self.store.unconfirmed_users_by_lunch_times(lunch_times, date)
    }

    // -----------------------------------------------------------------------
    // Users and organizations
    // -----------------------------------------------------------------------

    /// Register the sender. Returns `false` if they were already known.
    pub fn register_user(&self, user_id: i64, chat_id: i64, first_name: &str) -> Result<bool> {
        match self
            .store
            .register_user(&User::new(user_id, chat_id, first_name))
        {
            Ok(()) => Ok(true),
            Err(LunchError::UserExists(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn user(&self, user_id: i64) -> Result<User> {
        self.store
            .user(user_id)?
            .ok_or(LunchError::UserNotFound(user_id))
    }

    /// Create an organization. With an owner, the owner must be registered
    /// and joins it atomically with the creation.
    pub fn add_organization(
        &self,
        name: &str,
        lunch_time: LunchTime,
        owner_id: Option<i64>,
    ) -> Result<Organization> {
        let org = Organization::new(name.trim(), lunch_time, owner_id);
        self.store.insert_organization(&org)?;
        tracing::info!(org_id = %org.id, name = %org.name, %lunch_time, "organization created");
        Ok(org)
    }

    pub fn organization_by_id(&self, id: Uuid) -> Result<Organization> {
        self.store
            .organization(id)?
            .ok_or(LunchError::OrganizationNotFound(id))
    }

    pub fn join_organization(&self, org_id: Uuid, user_id: i64) -> Result<Organization> {
        self.store.join_organization(org_id, user_id)?;
        self.organization_by_id(org_id)
    }

    /// Set the address of the organization `user_id` belongs to.
    pub fn set_address(&self, user_id: i64, address: &str) -> Result<Organization> {
        let org_id = self
            .user(user_id)?
            .organization_id
            .ok_or(LunchError::NotInOrganization(user_id))?;
        self.set_organization_address(org_id, address)
    }

    pub fn set_organization_address(&self, org_id: Uuid, address: &str) -> Result<Organization> {
        self.store.set_address(org_id, address.trim())
    }

    pub fn set_full_name(
        &self,
        user_id: i64,
        first: &str,
        last: &str,
        middle: Option<&str>,
    ) -> Result<User> {
        self.store.set_full_name(user_id, first, last, middle)
    }
}

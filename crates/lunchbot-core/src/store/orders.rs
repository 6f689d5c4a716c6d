//! Order rows and the read-side aggregations built from them.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use redb::{ReadableTable, Table};
use uuid::Uuid;

use super::{
    decode, encode, order_key, order_range, storage, Store, ORDERS, ORGANIZATIONS, USERS,
};
use crate::error::{LunchError, Result};
use crate::lunch_time::LunchTime;
use crate::types::{
    Dish, DishCount, Order, Organization, OrganizationAmount, OrganizationOrders, User,
};

impl Store {
    /// Insert a draft order line for `user_id` dated `date`, provided the
    /// user's organization still accepts changes at `cutoff`.
    ///
    /// The organization is read and the order written in one write
    /// transaction. Returns `DeadlineExceeded` without writing anything when
    /// `cutoff` is later than the organization's lunch time or is `None`.
    pub fn add_order_before_cutoff(
        &self,
        user_id: i64,
        date: NaiveDate,
        dish: Dish,
        cutoff: Option<LunchTime>,
    ) -> Result<Order> {
        let wt = self.db.begin_write().map_err(storage)?;
        let order = {
            let users = wt.open_table(USERS).map_err(storage)?;
            let orgs = wt.open_table(ORGANIZATIONS).map_err(storage)?;
            let org = organization_of(&users, &orgs, user_id)?;
            if !accepts_changes(&org, cutoff) {
                return Err(LunchError::DeadlineExceeded);
            }
            let order = Order::draft(user_id, date, dish);
            let mut orders = wt.open_table(ORDERS).map_err(storage)?;
            orders
                .insert(
                    order_key(user_id, date, order.id).as_slice(),
                    encode(&order)?.as_slice(),
                )
                .map_err(storage)?;
            order
        };
        wt.commit().map_err(storage)?;
        Ok(order)
    }

    /// Mark every draft line of `user_id` on `date` as confirmed.
    ///
    /// Returns the number of lines that changed.
    pub fn confirm_orders(&self, user_id: i64, date: NaiveDate) -> Result<usize> {
        let wt = self.db.begin_write().map_err(storage)?;
        let changed = {
            let mut orders = wt.open_table(ORDERS).map_err(storage)?;
            let (lower, upper) = order_range(user_id, date, date);
            let mut drafts = Vec::new();
            for entry in orders
                .range(lower.as_slice()..=upper.as_slice())
                .map_err(storage)?
            {
                let (k, v) = entry.map_err(storage)?;
                let order: Order = decode(v.value())?;
                if !order.confirmed {
                    drafts.push((k.value().to_vec(), order));
                }
            }
            for (key, mut order) in drafts.iter().cloned() {
                order.confirmed = true;
                orders
                    .insert(key.as_slice(), encode(&order)?.as_slice())
                    .map_err(storage)?;
            }
            drafts.len()
        };
        wt.commit().map_err(storage)?;
        Ok(changed)
    }

    /// Delete every line of `user_id` on `date`. Returns the number deleted.
    pub fn delete_orders(&self, user_id: i64, date: NaiveDate) -> Result<usize> {
        let wt = self.db.begin_write().map_err(storage)?;
        let removed = {
            let mut orders = wt.open_table(ORDERS).map_err(storage)?;
            delete_range(&mut orders, user_id, date)?
        };
        wt.commit().map_err(storage)?;
        Ok(removed)
    }

    /// Like [`Store::delete_orders`], but only while the user's organization
    /// still accepts changes at `cutoff`. The check and the delete share one
    /// write transaction.
    pub fn delete_orders_before_cutoff(
        &self,
        user_id: i64,
        date: NaiveDate,
        cutoff: Option<LunchTime>,
    ) -> Result<usize> {
        let wt = self.db.begin_write().map_err(storage)?;
        let removed = {
            let users = wt.open_table(USERS).map_err(storage)?;
            let orgs = wt.open_table(ORGANIZATIONS).map_err(storage)?;
            let org = organization_of(&users, &orgs, user_id)?;
            if !accepts_changes(&org, cutoff) {
                return Err(LunchError::DeadlineExceeded);
            }
            let mut orders = wt.open_table(ORDERS).map_err(storage)?;
            delete_range(&mut orders, user_id, date)?
        };
        wt.commit().map_err(storage)?;
        Ok(removed)
    }

    /// All lines of `user_id` on `date`, oldest first.
    pub fn orders_for_user(&self, user_id: i64, date: NaiveDate) -> Result<Vec<Order>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let orders = rt.open_table(ORDERS).map_err(storage)?;
        let (lower, upper) = order_range(user_id, date, date);
        let mut result = Vec::new();
        for entry in orders
            .range(lower.as_slice()..=upper.as_slice())
            .map_err(storage)?
        {
            let (_, v) = entry.map_err(storage)?;
            result.push(decode::<Order>(v.value())?);
        }
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    /// Users of organizations whose lunch time is one of `lunch_times` and who
    /// have no confirmed line on `date`, keyed by that lunch time.
    pub fn unconfirmed_users_by_lunch_times(
        &self,
        lunch_times: &[LunchTime],
        date: NaiveDate,
    ) -> Result<HashMap<LunchTime, Vec<User>>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let orgs_table = rt.open_table(ORGANIZATIONS).map_err(storage)?;
        let users_table = rt.open_table(USERS).map_err(storage)?;
        let orders = rt.open_table(ORDERS).map_err(storage)?;

        let mut lunch_by_org = HashMap::new();
        for entry in orgs_table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            let org: Organization = decode(v.value())?;
            if lunch_times.contains(&org.lunch_time) {
                lunch_by_org.insert(org.id, org.lunch_time);
            }
        }

        let mut result: HashMap<LunchTime, Vec<User>> = HashMap::new();
        if lunch_by_org.is_empty() {
            return Ok(result);
        }
        for entry in users_table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            let user: User = decode(v.value())?;
            let Some(lunch) = user.organization_id.and_then(|id| lunch_by_org.get(&id)) else {
                continue;
            };
            let (lower, upper) = order_range(user.id, date, date);
            let mut confirmed = false;
            for line in orders
                .range(lower.as_slice()..=upper.as_slice())
                .map_err(storage)?
            {
                let (_, v) = line.map_err(storage)?;
                if decode::<Order>(v.value())?.confirmed {
                    confirmed = true;
                    break;
                }
            }
            if !confirmed {
                result.entry(*lunch).or_default().push(user);
            }
        }
        Ok(result)
    }

    /// Confirmed lines dated `date` of every organization whose lunch time
    /// equals `bucket`, grouped per dish with counts.
    ///
    /// Bucket equality is exact; organizations without confirmed lines are
    /// left out.
    pub fn aggregate_by_bucket(
        &self,
        bucket: LunchTime,
        date: NaiveDate,
    ) -> Result<BTreeMap<Uuid, OrganizationOrders>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let orgs_table = rt.open_table(ORGANIZATIONS).map_err(storage)?;
        let users_table = rt.open_table(USERS).map_err(storage)?;
        let orders = rt.open_table(ORDERS).map_err(storage)?;

        let mut matching: HashMap<Uuid, Organization> = HashMap::new();
        for entry in orgs_table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            let org: Organization = decode(v.value())?;
            if org.lunch_time == bucket {
                matching.insert(org.id, org);
            }
        }

        // org -> (category, name, price bits) -> count
        let mut counts: HashMap<Uuid, BTreeMap<(String, String, u64), (Dish, u32)>> =
            HashMap::new();
        if !matching.is_empty() {
            for entry in users_table.iter().map_err(storage)? {
                let (_, v) = entry.map_err(storage)?;
                let user: User = decode(v.value())?;
                let Some(org_id) = user.organization_id.filter(|id| matching.contains_key(id))
                else {
                    continue;
                };
                let (lower, upper) = order_range(user.id, date, date);
                for line in orders
                    .range(lower.as_slice()..=upper.as_slice())
                    .map_err(storage)?
                {
                    let (_, v) = line.map_err(storage)?;
                    let order: Order = decode(v.value())?;
                    if !order.confirmed {
                        continue;
                    }
                    let key = (
                        order.dish.category.clone(),
                        order.dish.name.clone(),
                        order.dish.price.to_bits(),
                    );
                    counts
                        .entry(org_id)
                        .or_default()
                        .entry(key)
                        .or_insert_with(|| (order.dish.clone(), 0))
                        .1 += 1;
                }
            }
        }

        let mut result = BTreeMap::new();
        for (org_id, dishes) in counts {
            let Some(organization) = matching.remove(&org_id) else {
                continue;
            };
            let dishes = dishes
                .into_values()
                .map(|(dish, count)| DishCount { dish, count })
                .collect();
            result.insert(
                org_id,
                OrganizationOrders {
                    organization,
                    dishes,
                },
            );
        }
        Ok(result)
    }

    /// Total confirmed amount per organization over `from..=to`, sorted by
    /// organization name. Organizations without orders are left out.
    pub fn aggregate_amount_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<OrganizationAmount>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let orgs_table = rt.open_table(ORGANIZATIONS).map_err(storage)?;
        let users_table = rt.open_table(USERS).map_err(storage)?;
        let orders = rt.open_table(ORDERS).map_err(storage)?;

        let mut amounts: HashMap<Uuid, f64> = HashMap::new();
        for entry in users_table.iter().map_err(storage)? {
            let (_, v) = entry.map_err(storage)?;
            let user: User = decode(v.value())?;
            let Some(org_id) = user.organization_id else {
                continue;
            };
            let (lower, upper) = order_range(user.id, from, to);
            for line in orders
                .range(lower.as_slice()..=upper.as_slice())
                .map_err(storage)?
            {
                let (_, v) = line.map_err(storage)?;
                let order: Order = decode(v.value())?;
                if order.confirmed {
                    *amounts.entry(org_id).or_default() += order.dish.price;
                }
            }
        }

        let mut result = Vec::with_capacity(amounts.len());
        for (org_id, amount) in amounts {
            let name = match orgs_table.get(org_id.as_u128()).map_err(storage)? {
                Some(v) => decode::<Organization>(v.value())?.name,
                None => org_id.to_string(),
            };
            result.push(OrganizationAmount {
                organization_id: org_id,
                organization_name: name,
                amount,
            });
        }
        result.sort_by(|a, b| a.organization_name.cmp(&b.organization_name));
        Ok(result)
    }
}

/// `None` means the cutoff has passed midnight, so every lunch of the day is
/// closed.
fn accepts_changes(org: &Organization, cutoff: Option<LunchTime>) -> bool {
    cutoff.is_some_and(|c| c <= org.lunch_time)
}

fn organization_of<U, O>(users: &U, orgs: &O, user_id: i64) -> Result<Organization>
where
    U: ReadableTable<i64, &'static [u8]>,
    O: ReadableTable<u128, &'static [u8]>,
{
    let user: User = match users.get(user_id).map_err(storage)? {
        Some(v) => decode(v.value())?,
        None => return Err(LunchError::UserNotFound(user_id)),
    };
    let org_id = user
        .organization_id
        .ok_or(LunchError::NotInOrganization(user_id))?;
    match orgs.get(org_id.as_u128()).map_err(storage)? {
        Some(v) => decode(v.value()),
        None => Err(LunchError::OrganizationNotFound(org_id)),
    }
}

fn delete_range(
    orders: &mut Table<'_, &'static [u8], &'static [u8]>,
    user_id: i64,
    date: NaiveDate,
) -> Result<usize> {
    let (lower, upper) = order_range(user_id, date, date);
    let mut keys = Vec::new();
    for entry in orders
        .range(lower.as_slice()..=upper.as_slice())
        .map_err(storage)?
    {
        let (k, _) = entry.map_err(storage)?;
        keys.push(k.value().to_vec());
    }
    for key in &keys {
        orders.remove(key.as_slice()).map_err(storage)?;
    }
    Ok(keys.len())
}

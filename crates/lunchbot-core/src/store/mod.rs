//! Persistent storage for users, organizations and orders using redb.
//!
//! # Table design
//!
//! ```text
//! USERS          i64  (chat user id)      -> JSON User
//! ORGANIZATIONS  u128 (uuid)              -> JSON Organization
//! ORDERS         28-byte composite key    -> JSON Order
//!                [ user_id: u64 BE, sign-flipped (8) | date: u32 BE days from CE (4) | uuid (16) ]
//! ```
//!
//! Because the user id and date occupy the high bytes in big-endian
//! encoding, all lines of one user's order for one day are a contiguous key
//! range, and a user's orders over a date interval are one range scan.
//!
//! redb serializes write transactions, so any check performed inside a write
//! transaction holds until that transaction commits. Deadline-guarded
//! mutations rely on this: the cutoff check and the write happen in the same
//! transaction.

mod orders;

use std::path::Path;

use chrono::{Datelike, NaiveDate};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{LunchError, Result};
use crate::types::{Organization, User};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const USERS: TableDefinition<i64, &[u8]> = TableDefinition::new("users");
const ORGANIZATIONS: TableDefinition<u128, &[u8]> = TableDefinition::new("organizations");
const ORDERS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("orders");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

const ORDER_KEY_LEN: usize = 28;
const ORDER_PREFIX_LEN: usize = 12;

fn user_key_bytes(user_id: i64) -> [u8; 8] {
    // Flip the sign bit so negative ids sort before positive ones.
    ((user_id as u64) ^ (1 << 63)).to_be_bytes()
}

fn date_key_bytes(date: NaiveDate) -> [u8; 4] {
    (date.num_days_from_ce().max(0) as u32).to_be_bytes()
}

fn order_prefix(user_id: i64, date: NaiveDate) -> [u8; ORDER_PREFIX_LEN] {
    let mut key = [0u8; ORDER_PREFIX_LEN];
    key[..8].copy_from_slice(&user_key_bytes(user_id));
    key[8..].copy_from_slice(&date_key_bytes(date));
    key
}

fn order_key(user_id: i64, date: NaiveDate, id: Uuid) -> [u8; ORDER_KEY_LEN] {
    let mut key = [0u8; ORDER_KEY_LEN];
    key[..ORDER_PREFIX_LEN].copy_from_slice(&order_prefix(user_id, date));
    key[ORDER_PREFIX_LEN..].copy_from_slice(id.as_bytes());
    key
}

/// Inclusive bounds covering every order of `user_id` dated `from..=to`.
fn order_range(user_id: i64, from: NaiveDate, to: NaiveDate) -> ([u8; ORDER_KEY_LEN], [u8; ORDER_KEY_LEN]) {
    let mut lower = [0u8; ORDER_KEY_LEN];
    lower[..ORDER_PREFIX_LEN].copy_from_slice(&order_prefix(user_id, from));
    let mut upper = [0xffu8; ORDER_KEY_LEN];
    upper[..ORDER_PREFIX_LEN].copy_from_slice(&order_prefix(user_id, to));
    (lower, upper)
}

pub(crate) fn storage(e: impl std::fmt::Display) -> LunchError {
    LunchError::Storage(e.to_string())
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(storage)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(storage)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Embedded database holding every persisted record of the bot.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the redb database at `path`.
    ///
    /// Creates all tables if they don't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(storage)?;
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(storage)?;
        wt.open_table(USERS).map_err(storage)?;
        wt.open_table(ORGANIZATIONS).map_err(storage)?;
        wt.open_table(ORDERS).map_err(storage)?;
        wt.commit().map_err(storage)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Insert a new user. Fails with `UserExists` if the id is taken.
    pub fn register_user(&self, user: &User) -> Result<()> {
        let value = encode(user)?;
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let mut users = wt.open_table(USERS).map_err(storage)?;
            if users.get(user.id).map_err(storage)?.is_some() {
                return Err(LunchError::UserExists(user.id));
            }
            users.insert(user.id, value.as_slice()).map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    pub fn user(&self, user_id: i64) -> Result<Option<User>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let users = rt.open_table(USERS).map_err(storage)?;
        let found = users.get(user_id).map_err(storage)?;
        found.map(|v| decode(v.value())).transpose()
    }

    /// Store the full name collected by the profile dialog.
    pub fn set_full_name(
        &self,
        user_id: i64,
        first: &str,
        last: &str,
        middle: Option<&str>,
    ) -> Result<User> {
        let wt = self.db.begin_write().map_err(storage)?;
        let user = {
            let mut users = wt.open_table(USERS).map_err(storage)?;
            let mut user: User = match users.get(user_id).map_err(storage)? {
                Some(v) => decode(v.value())?,
                None => return Err(LunchError::UserNotFound(user_id)),
            };
            user.first_name = first.to_string();
            user.last_name = Some(last.to_string());
            user.middle_name = middle.map(str::to_string);
            users
                .insert(user_id, encode(&user)?.as_slice())
                .map_err(storage)?;
            user
        };
        wt.commit().map_err(storage)?;
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Organizations
    // -----------------------------------------------------------------------

    /// Insert `org`. An owner must be registered and joins the organization
    /// in the same write transaction; `UserNotFound` leaves nothing behind.
    pub fn insert_organization(&self, org: &Organization) -> Result<()> {
        let value = encode(org)?;
        let wt = self.db.begin_write().map_err(storage)?;
        {
            if let Some(owner_id) = org.owner_id {
                let mut users = wt.open_table(USERS).map_err(storage)?;
                let mut owner: User = match users.get(owner_id).map_err(storage)? {
                    Some(v) => decode(v.value())?,
                    None => return Err(LunchError::UserNotFound(owner_id)),
                };
                owner.organization_id = Some(org.id);
                users
                    .insert(owner_id, encode(&owner)?.as_slice())
                    .map_err(storage)?;
            }
            let mut orgs = wt.open_table(ORGANIZATIONS).map_err(storage)?;
            orgs.insert(org.id.as_u128(), value.as_slice())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    pub fn organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let rt = self.db.begin_read().map_err(storage)?;
        let orgs = rt.open_table(ORGANIZATIONS).map_err(storage)?;
        let found = orgs.get(id.as_u128()).map_err(storage)?;
        found.map(|v| decode(v.value())).transpose()
    }

    /// Attach `user_id` to organization `org_id`, replacing any previous
    /// membership.
    pub fn join_organization(&self, org_id: Uuid, user_id: i64) -> Result<()> {
        let wt = self.db.begin_write().map_err(storage)?;
        {
            let orgs = wt.open_table(ORGANIZATIONS).map_err(storage)?;
            if orgs.get(org_id.as_u128()).map_err(storage)?.is_none() {
                return Err(LunchError::OrganizationNotFound(org_id));
            }
            let mut users = wt.open_table(USERS).map_err(storage)?;
            let mut user: User = match users.get(user_id).map_err(storage)? {
                Some(v) => decode(v.value())?,
                None => return Err(LunchError::UserNotFound(user_id)),
            };
            user.organization_id = Some(org_id);
            users
                .insert(user_id, encode(&user)?.as_slice())
                .map_err(storage)?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// Set the address of the organization `org_id`.
    pub fn set_address(&self, org_id: Uuid, address: &str) -> Result<Organization> {
        let wt = self.db.begin_write().map_err(storage)?;
        let org = {
            let mut orgs = wt.open_table(ORGANIZATIONS).map_err(storage)?;
            let mut org: Organization = match orgs.get(org_id.as_u128()).map_err(storage)? {
                Some(v) => decode(v.value())?,
                None => return Err(LunchError::OrganizationNotFound(org_id)),
            };
            org.address = Some(address.to_string());
            orgs.insert(org_id.as_u128(), encode(&org)?.as_slice())
                .map_err(storage)?;
            org
        };
        wt.commit().map_err(storage)?;
        Ok(org)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lunch_time::LunchTime;
    use tempfile::TempDir;

    pub(crate) fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("lunch.redb")).unwrap();
        (dir, store)
    }

    pub(crate) fn organization_count(store: &Store) -> u64 {
        use redb::ReadableTableMetadata;
        let rt = store.db.begin_read().unwrap();
        rt.open_table(ORGANIZATIONS).unwrap().len().unwrap()
    }

    #[test]
    fn register_and_load_user() {
        let (_dir, store) = open_tmp();
        store.register_user(&User::new(10, 100, "Ann")).unwrap();
        let user = store.user(10).unwrap().unwrap();
        assert_eq!(user.chat_id, 100);
        assert_eq!(user.first_name, "Ann");
        assert!(store.user(11).unwrap().is_none());
    }

    #[test]
    fn register_twice_fails() {
        let (_dir, store) = open_tmp();
        store.register_user(&User::new(10, 100, "Ann")).unwrap();
        let err = store.register_user(&User::new(10, 100, "Ann")).unwrap_err();
        assert!(matches!(err, LunchError::UserExists(10)));
    }

    #[test]
    fn join_requires_existing_organization() {
        let (_dir, store) = open_tmp();
        store.register_user(&User::new(10, 100, "Ann")).unwrap();
        let missing = Uuid::new_v4();
        let err = store.join_organization(missing, 10).unwrap_err();
        assert!(matches!(err, LunchError::OrganizationNotFound(id) if id == missing));
    }

    #[test]
    fn join_and_set_address() {
        let (_dir, store) = open_tmp();
        store.register_user(&User::new(10, 100, "Ann")).unwrap();
        let org = Organization::new("Acme", LunchTime::new(12, 30).unwrap(), Some(10));
        store.insert_organization(&org).unwrap();
        // The owner joins with the insert.
        assert_eq!(store.user(10).unwrap().unwrap().organization_id, Some(org.id));

        store.register_user(&User::new(11, 110, "Bob")).unwrap();
        store.join_organization(org.id, 11).unwrap();
        assert_eq!(store.user(11).unwrap().unwrap().organization_id, Some(org.id));

        let updated = store.set_address(org.id, "1 Main St").unwrap();
        assert_eq!(updated.address.as_deref(), Some("1 Main St"));
        assert_eq!(
            store.organization(org.id).unwrap().unwrap().address.as_deref(),
            Some("1 Main St")
        );
    }

    #[test]
    fn unknown_owner_leaves_no_organization() {
        let (_dir, store) = open_tmp();
        let org = Organization::new("Orphan", LunchTime::new(12, 30).unwrap(), Some(10));
        let err = store.insert_organization(&org).unwrap_err();
        assert!(matches!(err, LunchError::UserNotFound(10)));
        assert!(store.organization(org.id).unwrap().is_none());
        assert_eq!(organization_count(&store), 0);
    }

    #[test]
    fn set_full_name_updates_user() {
        let (_dir, store) = open_tmp();
        store.register_user(&User::new(10, 100, "ann")).unwrap();
        let user = store.set_full_name(10, "Ann", "Lee", Some("May")).unwrap();
        assert_eq!(user.first_name, "Ann");
        assert_eq!(user.last_name.as_deref(), Some("Lee"));
        assert_eq!(user.middle_name.as_deref(), Some("May"));
        assert!(matches!(
            store.set_full_name(99, "x", "y", None),
            Err(LunchError::UserNotFound(99))
        ));
    }

    #[test]
    fn order_keys_sort_by_user_then_date() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let a = order_key(5, d2, Uuid::nil());
        let b = order_key(6, d1, Uuid::nil());
        assert!(a < b);
        assert!(order_key(5, d1, Uuid::from_u128(u128::MAX)) < a);
        assert!(order_key(-1, d2, Uuid::nil()) < order_key(0, d1, Uuid::nil()));
    }
}

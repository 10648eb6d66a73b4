//! User records persisted under `user:{username}`.
//!
//! The full record is written once at creation. Every later change is a
//! targeted sub-path write, so a request updating one golem and the
//! clearinghouse updating coins never overwrite each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use guild_types::{Golem, Inventory, User};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::DbError;
use crate::path::DocPath;
use crate::store::DocumentStore;

/// Store key for a user record.
pub fn user_key(username: &str) -> String {
    format!("user:{username}")
}

/// Path of a golem inside a user record.
pub fn golem_path(symbol: &str) -> DocPath {
    DocPath::field("golems").child(symbol)
}

/// Path of an inventory inside a user record.
pub fn inventory_path(location: &str) -> DocPath {
    DocPath::field("inventories").child(location)
}

/// One write needed to bring a stored user record up to date.
#[derive(Debug, Clone, PartialEq)]
pub enum UserWrite {
    /// Replace the value at a path.
    Set(DocPath, Value),
    /// Remove the value at a path.
    Delete(DocPath),
}

/// Typed access to user records.
#[derive(Debug)]
pub struct UserRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for UserRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> UserRepository<S> {
    /// Wrap a shared store.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether a user record exists.
    pub async fn exists(&self, username: &str) -> Result<bool, DbError> {
        let value = self
            .store
            .get_at(&user_key(username), &DocPath::field("username"))
            .await?;
        Ok(value.is_some())
    }

    /// Write a complete new user record.
    pub async fn create(&self, user: &User) -> Result<(), DbError> {
        let value = serde_json::to_value(user)?;
        self.store
            .set_at(&user_key(&user.username), &DocPath::root(), value)
            .await?;
        debug!(username = %user.username, "user record created");
        Ok(())
    }

    /// Load a user record, `None` if absent.
    pub async fn load(&self, username: &str) -> Result<Option<User>, DbError> {
        let value = self
            .store
            .get_at(&user_key(username), &DocPath::root())
            .await?;
        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(DbError::from)
    }

    /// Write one golem.
    pub async fn set_golem(&self, username: &str, golem: &Golem) -> Result<(), DbError> {
        self.set(username, golem_path(&golem.symbol), golem).await
    }

    /// Write the coin balance.
    pub async fn set_coins(&self, username: &str, coins: u64) -> Result<(), DbError> {
        self.set(username, DocPath::field("coins"), &coins).await
    }

    /// Write one inventory.
    pub async fn set_inventory(
        &self,
        username: &str,
        location: &str,
        inventory: &Inventory,
    ) -> Result<(), DbError> {
        self.set(username, inventory_path(location), inventory).await
    }

    /// Remove one inventory.
    pub async fn delete_inventory(&self, username: &str, location: &str) -> Result<u64, DbError> {
        self.store
            .delete_at(&user_key(username), &inventory_path(location))
            .await
    }

    /// Persist the difference between two snapshots of the same user.
    ///
    /// Only paths whose values differ are written. Returns the number of
    /// writes issued.
    pub async fn commit(&self, before: &User, after: &User) -> Result<usize, DbError> {
        let key = user_key(&after.username);
        let writes = changed_paths(before, after)?;
        for write in &writes {
            match write {
                UserWrite::Set(path, value) => {
                    self.store.set_at(&key, path, value.clone()).await?;
                }
                UserWrite::Delete(path) => {
                    self.store.delete_at(&key, path).await?;
                }
            }
        }
        if !writes.is_empty() {
            debug!(username = %after.username, writes = writes.len(), "user committed");
        }
        Ok(writes.len())
    }

    async fn set<T: Serialize + Sync>(
        &self,
        username: &str,
        path: DocPath,
        value: &T,
    ) -> Result<(), DbError> {
        let value = serde_json::to_value(value)?;
        self.store.set_at(&user_key(username), &path, value).await
    }
}

/// Compute the sub-path writes that turn `before` into `after`.
///
/// Inventories are written first and golems last, so a golem never appears
/// idle before the cargo changes it settled are visible.
pub fn changed_paths(before: &User, after: &User) -> Result<Vec<UserWrite>, DbError> {
    let mut writes = Vec::new();

    diff_map(&mut writes, "inventories", &before.inventories, &after.inventories)?;

    if before.coins != after.coins {
        writes.push(set_write(DocPath::field("coins"), &after.coins)?);
    }
    if before.mana != after.mana {
        writes.push(set_write(DocPath::field("mana"), &after.mana)?);
    }
    if before.last_harvest_tick != after.last_harvest_tick {
        writes.push(set_write(
            DocPath::field("last-harvest-tick"),
            &after.last_harvest_tick,
        )?);
    }
    if before.known_rituals != after.known_rituals {
        writes.push(set_write(
            DocPath::field("known-rituals"),
            &after.known_rituals,
        )?);
    }

    diff_map(&mut writes, "golems", &before.golems, &after.golems)?;
    Ok(writes)
}

fn set_write<T: Serialize>(path: DocPath, value: &T) -> Result<UserWrite, DbError> {
    Ok(UserWrite::Set(path, serde_json::to_value(value)?))
}

fn diff_map<T: Serialize + PartialEq>(
    writes: &mut Vec<UserWrite>,
    field: &str,
    before: &BTreeMap<String, T>,
    after: &BTreeMap<String, T>,
) -> Result<(), DbError> {
    for symbol in before.keys() {
        if !after.contains_key(symbol) {
            writes.push(UserWrite::Delete(DocPath::field(field).child(symbol.as_str())));
        }
    }
    for (symbol, value) in after {
        if before.get(symbol) != Some(value) {
            writes.push(set_write(DocPath::field(field).child(symbol.as_str()), value)?);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use guild_types::{Archetype, GolemStatus, ManaDetails};

    use super::*;
    use crate::memory::MemoryStore;

    fn sample_user() -> User {
        let now = Utc::now();
        let mut user = User {
            username: "ada".to_owned(),
            coins: 0,
            mana: ManaDetails {
                mana: 3600.0,
                mana_cap: 21600.0,
                mana_regen: 1.0,
                last_mana_tick: now,
            },
            golems: BTreeMap::new(),
            inventories: BTreeMap::new(),
            last_harvest_tick: now,
            known_rituals: ["summon-invoker".to_owned()].into_iter().collect(),
            user_since: now,
        };
        user.golems.insert(
            "MER-0".to_owned(),
            Golem {
                symbol: "MER-0".to_owned(),
                archetype: Archetype::Merchant,
                location_symbol: "A-G".to_owned(),
                status: GolemStatus::Idle,
                status_detail: None,
                arrival_time: None,
                capacity: 25,
            },
        );
        let mut inv = Inventory::new("A-G");
        inv.contents.insert("LOGS".to_owned(), 100);
        user.inventories.insert("A-G".to_owned(), inv);
        user
    }

    #[test]
    fn unchanged_user_needs_no_writes() {
        let user = sample_user();
        assert!(changed_paths(&user, &user).unwrap().is_empty());
    }

    #[test]
    fn only_changed_fields_are_written() {
        let before = sample_user();
        let mut after = before.clone();
        after.coins = 42;
        after.inventories.remove("A-G");
        after.golems.get_mut("MER-0").unwrap().status = GolemStatus::Transacting;

        let writes = changed_paths(&before, &after).unwrap();
        assert_eq!(
            writes,
            vec![
                UserWrite::Delete(inventory_path("A-G")),
                UserWrite::Set(DocPath::field("coins"), serde_json::json!(42)),
                UserWrite::Set(
                    golem_path("MER-0"),
                    serde_json::to_value(after.golems.get("MER-0").unwrap()).unwrap()
                ),
            ]
        );
    }

    #[test]
    fn harvest_tick_uses_kebab_case_path() {
        let before = sample_user();
        let mut after = before.clone();
        after.last_harvest_tick = before
            .last_harvest_tick
            .checked_add_signed(TimeDelta::try_seconds(5).unwrap())
            .unwrap();
        let writes = changed_paths(&before, &after).unwrap();
        assert!(matches!(
            writes.first(),
            Some(UserWrite::Set(path, _)) if path == &DocPath::field("last-harvest-tick")
        ));
    }

    #[tokio::test]
    async fn create_load_commit_round_trip() {
        let repo = UserRepository::new(Arc::new(MemoryStore::new()));
        let before = sample_user();
        repo.create(&before).await.unwrap();
        assert!(repo.exists("ada").await.unwrap());
        assert!(!repo.exists("bob").await.unwrap());

        let mut after = before.clone();
        after.coins = 7;
        let mut cargo = Inventory::new("MER-0");
        cargo.contents.insert("LOGS".to_owned(), 5);
        after.inventories.insert("MER-0".to_owned(), cargo);

        assert_eq!(repo.commit(&before, &after).await.unwrap(), 2);
        assert_eq!(repo.load("ada").await.unwrap(), Some(after));
    }

    #[tokio::test]
    async fn targeted_writes_do_not_clobber_each_other() {
        let repo = UserRepository::new(Arc::new(MemoryStore::new()));
        let user = sample_user();
        repo.create(&user).await.unwrap();

        // Two actors working from the same stale snapshot touch
        // different fields; both changes survive.
        let mut golem = user.golems.get("MER-0").cloned().unwrap();
        golem.status = GolemStatus::Traveling;
        repo.set_golem("ada", &golem).await.unwrap();
        repo.set_coins("ada", 99).await.unwrap();

        let loaded = repo.load("ada").await.unwrap().unwrap();
        assert_eq!(loaded.coins, 99);
        assert_eq!(loaded.golems.get("MER-0").unwrap().status, GolemStatus::Traveling);
    }

    #[tokio::test]
    async fn emptied_inventory_is_deleted() {
        let repo = UserRepository::new(Arc::new(MemoryStore::new()));
        repo.create(&sample_user()).await.unwrap();

        assert_eq!(repo.delete_inventory("ada", "A-G").await.unwrap(), 1);
        assert_eq!(repo.delete_inventory("ada", "A-G").await.unwrap(), 0);
        assert!(repo.load("ada").await.unwrap().unwrap().inventories.is_empty());
    }
}

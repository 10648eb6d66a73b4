//! Per-golem edit locks and per-user commit gates.
//!
//! A status change holds the edit lock for its golem for the whole
//! request. The lock fails fast: a second request for the same golem gets
//! [`GameError::GolemLockedForEditing`] instead of waiting.
//!
//! The commit gate is finer grained. It serializes the load, recompute and
//! commit window for one user so that concurrent requests and settlements
//! never interleave their writes to the same record.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::error::GameError;

// ---------------------------------------------------------------------------
// Edit locks
// ---------------------------------------------------------------------------

/// Registry of golems currently being edited, keyed by username.
#[derive(Debug, Default)]
pub struct GolemLocks {
    held: Mutex<HashMap<String, HashSet<String>>>,
}

impl GolemLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the edit lock for `golem` of `username`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::GolemLockedForEditing`] if the lock is held.
    pub fn try_acquire(
        self: &Arc<Self>,
        username: &str,
        golem: &str,
    ) -> Result<GolemLockGuard, GameError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let golems = held.entry(username.to_owned()).or_default();
        if !golems.insert(golem.to_owned()) {
            debug!(username, golem, "golem is locked for editing");
            return Err(GameError::GolemLockedForEditing {
                username: username.to_owned(),
                golem: golem.to_owned(),
            });
        }
        Ok(GolemLockGuard {
            locks: Arc::clone(self),
            username: username.to_owned(),
            golem: golem.to_owned(),
        })
    }

    /// Whether the lock for `golem` of `username` is held.
    pub fn is_locked(&self, username: &str, golem: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .is_some_and(|golems| golems.contains(golem))
    }

    fn release_key(&self, username: &str, golem: &str) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(golems) = held.get_mut(username) {
            golems.remove(golem);
            if golems.is_empty() {
                held.remove(username);
            }
        }
    }
}

/// Holds one edit lock; releases it on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct GolemLockGuard {
    locks: Arc<GolemLocks>,
    username: String,
    golem: String,
}

impl GolemLockGuard {
    /// Release the lock now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for GolemLockGuard {
    fn drop(&mut self) {
        self.locks.release_key(&self.username, &self.golem);
    }
}

// ---------------------------------------------------------------------------
// Commit gates
// ---------------------------------------------------------------------------

/// One async mutex per user, created on first use and pruned once no
/// request holds or waits on it.
#[derive(Debug, Default)]
pub struct CommitGates {
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommitGates {
    /// Create an empty set of gates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the gate for `username`.
    pub async fn lock(&self, username: &str) -> CommitGate<'_> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(username.to_owned()).or_default())
        };
        CommitGate {
            gates: self,
            username: username.to_owned(),
            guard: Some(gate.lock_owned().await),
        }
    }

    fn prune(&self, username: &str) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if gates
            .get(username)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(username);
        }
    }
}

/// Holds one user's commit gate; opens it on drop.
#[derive(Debug)]
#[must_use = "the gate opens as soon as the guard is dropped"]
pub struct CommitGate<'a> {
    gates: &'a CommitGates,
    username: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CommitGate<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.gates.prune(&self.username);
    }
}

//! Per-entity exclusive locks.
//!
//! Every mutating rental operation takes the locks of the rider and vehicle
//! it touches before its first read and keeps them until it returns, so two
//! requests for the same bike or the same rider never interleave their
//! check-then-act sequences. Locks live in this process only.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identity of a lockable entity.
///
/// The derived ordering is the global acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    User(i32),
    Bike(String),
    Shuttle(String),
    SharedVehicle(String),
}

/// Registry of one mutex per entity, created on first use.
#[derive(Debug, Default)]
pub struct EntityLocks {
    slots: DashMap<LockKey, Arc<Mutex<()>>>,
}

/// Guards held for the duration of one operation; released on drop.
#[derive(Debug)]
pub struct LockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key, in sorted order so overlapping sets cannot deadlock.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> LockSet {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slots.entry(key).or_default().clone();
            guards.push(slot.lock_owned().await);
        }

        LockSet { _guards: guards }
    }
}

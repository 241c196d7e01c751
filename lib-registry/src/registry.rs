//! ICO Registry
//!
//! In-memory index of ICO definitions plus the per-ICO minted counters
//! used as the bonding-curve supply input.
//!
//! # Concurrency
//!
//! The record map is read-mostly (mutated only by `define`) and sits
//! behind a `RwLock`. The minted counter is the system's central mutable
//! shared state: every compute-then-commit sequence for one ICO must be
//! serialized so that no purchase is priced against a supply another
//! purchase is about to invalidate. `begin_purchase` hands out an owned
//! per-ICO guard covering "read supply for pricing" through "commit";
//! ICOs never contend with each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use lib_pricing::Curve;

use crate::errors::{RegistryError, RegistryResult, ValidationError};
use crate::schema::IcoRecord;
use crate::store::ConfigStore;

/// A registered ICO: validated record, pre-built curve, minted state.
pub struct IcoEntry {
    record: IcoRecord,
    curve: Curve,
    minted: Arc<AtomicU64>,
    purchase_lock: Arc<Mutex<()>>,
}

impl IcoEntry {
    /// The ICO definition.
    pub fn record(&self) -> &IcoRecord {
        &self.record
    }

    /// The validated pricing curve.
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Current minted supply in base units (snapshot read).
    pub fn minted(&self) -> u64 {
        self.minted.load(Ordering::Acquire)
    }
}

/// Exclusive per-ICO critical section from price computation to commit.
///
/// Holding the guard blocks every other purchase of the same ICO; the
/// supply observed through [`MintedGuard::minted`] therefore stays valid
/// until [`commit_buy`](MintedGuard::commit_buy) or
/// [`commit_sell`](MintedGuard::commit_sell) completes.
pub struct MintedGuard {
    ico_id: String,
    minted: Arc<AtomicU64>,
    _permit: OwnedMutexGuard<()>,
}

impl MintedGuard {
    /// Minted supply observed at decision time.
    pub fn minted(&self) -> u64 {
        self.minted.load(Ordering::Acquire)
    }

    /// Commit a buy: increment the counter. Returns the new total.
    pub fn commit_buy(self, amount: u64) -> RegistryResult<u64> {
        let current = self.minted.load(Ordering::Acquire);
        let next = current
            .checked_add(amount)
            .ok_or_else(|| RegistryError::CounterOverflow(self.ico_id.clone()))?;
        self.minted.store(next, Ordering::Release);
        debug!(ico_id = %self.ico_id, amount, total = next, "minted counter incremented");
        Ok(next)
    }

    /// Commit an audited sell: decrement the counter. Returns the new
    /// total. Decrementing below zero is an error, never a wrap.
    pub fn commit_sell(self, amount: u64) -> RegistryResult<u64> {
        let current = self.minted.load(Ordering::Acquire);
        let next = current
            .checked_sub(amount)
            .ok_or(RegistryError::InsufficientMinted {
                have: current,
                want: amount,
            })?;
        self.minted.store(next, Ordering::Release);
        debug!(ico_id = %self.ico_id, amount, total = next, "minted counter decremented");
        Ok(next)
    }
}

/// Registry of ICO definitions and minted-supply state.
#[derive(Default)]
pub struct IcoRegistry {
    inner: RwLock<HashMap<String, Arc<IcoEntry>>>,
}

impl IcoRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an ICO by id. Unknown id is `None`, never an error.
    pub fn get(&self, ico_id: &str) -> Option<Arc<IcoEntry>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(ico_id)
            .cloned()
    }

    /// Number of registered ICOs.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current minted supply for an ICO, zero when unknown.
    pub fn current_minted(&self, ico_id: &str) -> u64 {
        self.get(ico_id).map(|entry| entry.minted()).unwrap_or(0)
    }

    /// Enter the per-ICO critical section for a purchase or sale.
    pub async fn begin_purchase(&self, ico_id: &str) -> RegistryResult<MintedGuard> {
        let entry = self
            .get(ico_id)
            .ok_or_else(|| RegistryError::NotFound(ico_id.to_string()))?;
        let permit = entry.purchase_lock.clone().lock_owned().await;
        Ok(MintedGuard {
            ico_id: ico_id.to_string(),
            minted: entry.minted.clone(),
            _permit: permit,
        })
    }

    /// Atomically increment the minted counter for an ICO.
    ///
    /// The only sanctioned standalone mutator; concurrent callers for the
    /// same id are serialized, so N concurrent increments of 1 always
    /// yield exactly N.
    pub async fn reserve_and_increment(&self, ico_id: &str, amount: u64) -> RegistryResult<u64> {
        let guard = self.begin_purchase(ico_id).await?;
        guard.commit_buy(amount)
    }

    /// Validate and register an ICO definition, persisting it first.
    ///
    /// Persistence happens before the in-memory insert so a store failure
    /// leaves the registry untouched (all-or-nothing). Redefining an
    /// existing id replaces the record but keeps its minted counter.
    pub fn define(&self, record: IcoRecord, store: &ConfigStore) -> RegistryResult<()> {
        record.validate()?;
        let curve = record.curve().map_err(ValidationError::Curve)?;
        store.save(&record)?;
        self.insert_entry(record, curve);
        Ok(())
    }

    /// Load all valid definitions from the store at startup.
    ///
    /// Returns the number registered. Records that fail validation are
    /// skipped with a warning, matching the store's lenient load.
    pub fn load_from(&self, store: &ConfigStore) -> usize {
        let mut count = 0;
        for record in store.load_all() {
            match record.curve() {
                Ok(curve) if record.validate().is_ok() => {
                    self.insert_entry(record, curve);
                    count += 1;
                }
                _ => {
                    warn!(ico_id = record.id(), "stored ICO config failed validation, skipping");
                }
            }
        }
        info!(count, "registered ICOs from config store");
        count
    }

    fn insert_entry(&self, record: IcoRecord, curve: Curve) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let id = record.id().to_string();
        let (minted, purchase_lock) = match map.get(&id) {
            Some(existing) => (existing.minted.clone(), existing.purchase_lock.clone()),
            None => (
                Arc::new(AtomicU64::new(0)),
                Arc::new(Mutex::new(())),
            ),
        };
        map.insert(
            id,
            Arc::new(IcoEntry {
                record,
                curve,
                minted,
                purchase_lock,
            }),
        );
    }
}

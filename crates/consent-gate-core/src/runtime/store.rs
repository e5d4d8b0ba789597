// crates/consent-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Consent Gate In-Memory Store
// Description: In-memory confirmation store and shared store wrapper.
// Purpose: Provide a mutex-guarded store for tests and single-process deployments.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryConfirmationStore`] keeps records in a mutex-guarded map. Every
//! state change happens under the lock, which makes
//! [`ConfirmationStore::transition`] atomic. Records do not survive a restart;
//! use the SQLite store for durable confirmations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ConfirmationStatus;
use crate::core::IdentityKey;
use crate::core::PendingConfirmation;
use crate::core::Timestamp;
use crate::interfaces::ConfirmationStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory confirmation store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfirmationStore {
    /// Records keyed by token digest.
    records: Arc<Mutex<BTreeMap<String, PendingConfirmation>>>,
}

impl InMemoryConfirmationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Acquires the record map.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, PendingConfirmation>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Store("confirmation store mutex poisoned".to_string()))
    }
}

impl ConfirmationStore for InMemoryConfirmationStore {
    fn insert(&self, record: &PendingConfirmation) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.token_digest) {
            return Err(StoreError::Invalid("confirmation token collision".to_string()));
        }
        guard.insert(record.token_digest.clone(), record.clone());
        Ok(())
    }

    fn load(&self, token_digest: &str) -> Result<Option<PendingConfirmation>, StoreError> {
        Ok(self.lock()?.get(token_digest).cloned())
    }

    fn transition(
        &self,
        token_digest: &str,
        status: ConfirmationStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let Some(record) = guard.get_mut(token_digest) else {
            return Ok(false);
        };
        if record.status != ConfirmationStatus::Pending {
            return Ok(false);
        }
        record.status = status;
        record.resolved_at = Some(at);
        Ok(true)
    }

    fn expire_pending(&self, now: Timestamp) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let mut expired = 0;
        for record in guard.values_mut() {
            if record.is_lapsed(now) {
                record.status = ConfirmationStatus::Expired;
                record.resolved_at = Some(now);
                expired += 1;
            }
        }
        Ok(expired)
    }

    fn purge_resolved(&self, resolved_before: Timestamp) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let before = guard.len();
        guard.retain(|_, record| {
            !(record.status.is_terminal()
                && record.resolved_at.is_some_and(|resolved| resolved < resolved_before))
        });
        Ok(before - guard.len())
    }

    fn list_pending(
        &self,
        requester: &IdentityKey,
        now: Timestamp,
    ) -> Result<Vec<PendingConfirmation>, StoreError> {
        let guard = self.lock()?;
        let mut pending: Vec<PendingConfirmation> = guard
            .values()
            .filter(|record| {
                record.status == ConfirmationStatus::Pending
                    && !record.is_lapsed(now)
                    && &record.requester == requester
            })
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.created_at);
        Ok(pending)
    }
}

// ============================================================================
// SECTION: Shared Store
// ============================================================================

/// Shared confirmation store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedConfirmationStore {
    /// Inner store implementation.
    inner: Arc<dyn ConfirmationStore>,
}

impl SharedConfirmationStore {
    /// Wraps a confirmation store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl ConfirmationStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn ConfirmationStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl ConfirmationStore for SharedConfirmationStore {
    fn insert(&self, record: &PendingConfirmation) -> Result<(), StoreError> {
        self.inner.insert(record)
    }

    fn load(&self, token_digest: &str) -> Result<Option<PendingConfirmation>, StoreError> {
        self.inner.load(token_digest)
    }

    fn transition(
        &self,
        token_digest: &str,
        status: ConfirmationStatus,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        self.inner.transition(token_digest, status, at)
    }

    fn expire_pending(&self, now: Timestamp) -> Result<usize, StoreError> {
        self.inner.expire_pending(now)
    }

    fn purge_resolved(&self, resolved_before: Timestamp) -> Result<usize, StoreError> {
        self.inner.purge_resolved(resolved_before)
    }

    fn list_pending(
        &self,
        requester: &IdentityKey,
        now: Timestamp,
    ) -> Result<Vec<PendingConfirmation>, StoreError> {
        self.inner.list_pending(requester, now)
    }
}

//! Registry of audit-eligible model types
//!
//! The registry maps fully-qualified type identities (`crate::module::Type`)
//! to eligibility. It is filled once at startup, by the scanner and/or by
//! explicit registration, then sealed. Sealing publishes the set and opens a
//! readiness barrier that the hook dispatcher awaits before its first
//! eligibility check.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docaudit_core::registry::ModelRegistry;
//!
//! let registry = ModelRegistry::new();
//! registry.register_model::<User>()?;
//! registry.seal();
//!
//! assert!(registry.contains(docaudit_core::type_identity::<User>()));
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! staging ── register()* ──► seal() ──► sealed (read-only, ready)
//! ```
//!
//! Entries are never removed; registration after sealing fails with
//! [`Error::RegistrySealed`].

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::model::{Model, normalize_identity, type_identity};

/// Set of audit-eligible type identities
///
/// ## Thread Safety
///
/// Registration goes through a mutex-guarded staging set. After sealing,
/// lookups read an immutable set without locking.
#[derive(Debug)]
pub struct ModelRegistry {
    /// Identities registered before sealing
    staging: Mutex<BTreeSet<String>>,

    /// Published set, written exactly once
    sealed: OnceLock<BTreeSet<String>>,

    /// Flips to `true` when sealed
    ready_tx: watch::Sender<bool>,
}

impl ModelRegistry {
    /// Create a new empty, unsealed registry
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            staging: Mutex::new(BTreeSet::new()),
            sealed: OnceLock::new(),
            ready_tx,
        }
    }

    /// Process-wide registry instance
    pub fn global() -> Arc<ModelRegistry> {
        static GLOBAL: OnceLock<Arc<ModelRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ModelRegistry::new())))
    }

    /// Register a type identity
    ///
    /// Registering the same identity twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::RegistrySealed`] once [`ModelRegistry::seal`] has run.
    pub fn register(&self, identity: impl AsRef<str>) -> Result<()> {
        let identity = normalize_identity(identity.as_ref()).to_string();
        let mut staging = self.staging.lock().unwrap_or_else(|e| e.into_inner());

        if self.sealed.get().is_some() {
            return Err(Error::RegistrySealed(identity));
        }

        if staging.insert(identity.clone()) {
            tracing::debug!(model = %identity, "registered audit-eligible model");
        }
        Ok(())
    }

    /// Register a model type by its type identity
    pub fn register_model<M: Model>(&self) -> Result<()> {
        self.register(type_identity::<M>())
    }

    /// Publish the registered set and release everyone waiting on readiness
    ///
    /// Only the first call has an effect.
    pub fn seal(&self) {
        let mut staging = self.staging.lock().unwrap_or_else(|e| e.into_inner());
        if self.sealed.get().is_some() {
            return;
        }

        let set = std::mem::take(&mut *staging);
        let count = set.len();
        // Cannot fail: checked under the staging lock above
        let _ = self.sealed.set(set);
        drop(staging);

        self.ready_tx.send_replace(true);
        tracing::info!("model registry sealed with {} eligible models", count);
    }

    /// Whether [`ModelRegistry::seal`] has run
    pub fn is_ready(&self) -> bool {
        self.sealed.get().is_some()
    }

    /// Wait until the registry is sealed
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Wait until the registry is sealed, giving up after `timeout`
    ///
    /// Returns `true` when the registry is ready.
    pub async fn wait_ready_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_ready()).await.is_ok()
    }

    /// Whether `identity` is audit-eligible
    ///
    /// Always `false` before sealing.
    pub fn contains(&self, identity: &str) -> bool {
        self.sealed
            .get()
            .is_some_and(|set| set.contains(normalize_identity(identity)))
    }

    /// Sealed identities in sorted order (empty before sealing)
    pub fn list(&self) -> Vec<String> {
        self.sealed
            .get()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sealed identities
    pub fn len(&self) -> usize {
        self.sealed.get().map_or(0, BTreeSet::len)
    }

    /// Check if no identity is sealed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared, hot-swappable setting.
//!
//! Readers take cheap `Arc<Setting>` snapshots or subscribe to a `watch`
//! channel. Writers are serialized; a new value is validated and persisted
//! before it is published.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use mah_core::ConfigError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth_key::{AuthKeyProvider, SessionKeyGenerator};
use crate::schema::{RESTART_REQUIRED_KEYS, Setting};
use crate::storage::{MemoryStorage, Storage};
use crate::validate::validate_setting;

/// Notified synchronously after a new setting has been published.
///
/// Runs after the store's write lock is released, so an observer may call
/// back into the store.
pub trait SettingObserver: Send + Sync {
    fn on_changed(&self, previous: &Setting, current: &Setting);
}

/// Previous and current setting of a published change, pending notification.
type Published = (Arc<Setting>, Arc<Setting>);

pub struct ConfigStore {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn SessionKeyGenerator>,
    current: watch::Sender<Arc<Setting>>,
    write_lock: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn SettingObserver>>>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Load the initial setting from `storage`.
    pub fn open(
        storage: Arc<dyn Storage>,
        generator: Arc<dyn SessionKeyGenerator>,
    ) -> Result<Self, ConfigError> {
        let setting = Setting::load(storage.as_ref(), generator.as_ref())?;
        let (current, _) = watch::channel(Arc::new(setting));
        Ok(Self {
            storage,
            generator,
            current,
            write_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        })
    }

    /// Current setting. Never torn; may be stale by the time it is used.
    pub fn snapshot(&self) -> Arc<Setting> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Setting>> {
        self.current.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn SettingObserver>) {
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Validate, persist and publish `setting`. Returns `true` if anything changed.
    ///
    /// On error nothing is published and the previous snapshot stays current.
    pub fn save(&self, setting: Setting) -> Result<bool, ConfigError> {
        let published = {
            let _guard = self.lock_writes();
            self.persist_and_publish(setting)?
        };
        Ok(self.notify(published))
    }

    /// Read-modify-write the current setting.
    pub fn update<F>(&self, mutate: F) -> Result<Arc<Setting>, ConfigError>
    where
        F: FnOnce(&mut Setting),
    {
        let (published, current) = {
            let _guard = self.lock_writes();
            let mut next = Setting::clone(&self.snapshot());
            mutate(&mut next);
            let published = self.persist_and_publish(next)?;
            (published, self.snapshot())
        };
        self.notify(published);
        Ok(current)
    }

    /// Replace the auth key with a freshly generated one and return it.
    pub fn rotate_auth_key(&self) -> Result<String, ConfigError> {
        let key = AuthKeyProvider::new(self.generator.as_ref()).generate();
        self.update(|setting| setting.auth_key = key.clone())?;
        info!("rotated auth key");
        Ok(key)
    }

    /// Re-read storage and publish the result if it differs.
    ///
    /// An invalid document is rejected and the previous snapshot kept. A key
    /// that disappeared from storage is restored from the current snapshot
    /// rather than regenerated. Storage only takes the new document once it
    /// has loaded cleanly.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let published = {
            let _guard = self.lock_writes();
            let previous = self.snapshot();
            let restore_key = || previous.auth_key.clone();
            let fresh = self
                .storage
                .refresh(&|document| {
                    let staged = MemoryStorage::from_document(document.clone());
                    Setting::load_with(&staged, restore_key).map(drop)
                })
                .and_then(|_| Setting::load_with(self.storage.as_ref(), restore_key))
                .inspect_err(|e| {
                    warn!(storage = %self.storage.describe(), error = %e, "rejected setting reload");
                })?;
            self.publish(fresh)
        };
        Ok(self.notify(published))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist_and_publish(&self, next: Setting) -> Result<Option<Published>, ConfigError> {
        validate_setting(&next)?;
        if self.snapshot().changed_keys(&next).is_empty() {
            return Ok(None);
        }
        next.save(self.storage.as_ref())?;
        Ok(self.publish(next))
    }

    /// Swap in `next` if it differs. Callers hold the write lock.
    fn publish(&self, next: Setting) -> Option<Published> {
        let previous = self.snapshot();
        let changed = previous.changed_keys(&next);
        if changed.is_empty() {
            debug!("setting unchanged");
            return None;
        }

        let next = Arc::new(next);
        self.current.send_replace(next.clone());
        info!(keys = ?changed, "setting updated");

        let needs_restart: Vec<&str> = changed
            .iter()
            .copied()
            .filter(|key| RESTART_REQUIRED_KEYS.contains(key))
            .collect();
        if !needs_restart.is_empty() {
            warn!(keys = ?needs_restart, "changed keys take effect after a server restart");
        }
        Some((previous, next))
    }

    /// Run observers for a published change. Must be called without the write lock.
    fn notify(&self, published: Option<Published>) -> bool {
        let Some((previous, next)) = published else {
            return false;
        };
        let observers = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in observers {
            observer.on_changed(&previous, &next);
        }
        true
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

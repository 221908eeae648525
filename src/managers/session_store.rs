//! Session Snapshot Store.
//!
//! Captures and restores the cookies of the configured domain per key (a tab
//! id) within the single partition every tab shares. Snapshots are cached in
//! memory and mirrored to the durable store when cookie persistence is on.
//! Cookie jar faults propagate; durable store faults are logged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::database::KeyValueStore;
use crate::services::config_service::SharedConfig;
use crate::services::cookie_jar::CookieJar;
use crate::types::errors::CookieError;
use crate::types::session::{CookieFilter, StoredCookie};

pub const SESSION_STATE_NAMESPACE: &str = "session-state";
pub const SESSION_STATE_KEY: &str = "sessions";

type SnapshotMap = HashMap<String, Vec<StoredCookie>>;

pub struct SessionSnapshotStore {
    jar: Arc<dyn CookieJar>,
    store: Arc<dyn KeyValueStore>,
    config: SharedConfig,
    cache: Mutex<SnapshotMap>,
}

impl SessionSnapshotStore {
    /// Creates the store, seeding the cache from disk when persistence is enabled.
    pub fn new(jar: Arc<dyn CookieJar>, store: Arc<dyn KeyValueStore>, config: SharedConfig) -> Self {
        let cache = if config.get().session.persist_cookies {
            load_persisted(store.as_ref())
        } else {
            SnapshotMap::new()
        };
        Self {
            jar,
            store,
            config,
            cache: Mutex::new(cache),
        }
    }

    /// Saves the configured domain's cookies under `key`, replacing any prior snapshot.
    pub async fn capture_snapshot(&self, key: &str) -> Result<(), CookieError> {
        let session = self.config.get().session;
        if !session.persist_cookies {
            return Ok(());
        }
        let cookies = self
            .jar
            .get(&CookieFilter::domain(&session.cookie_domain))
            .await?;
        debug!(key, count = cookies.len(), "captured cookie snapshot");
        self.lock_cache().insert(key.to_string(), cookies);
        self.persist();
        Ok(())
    }

    /// Replaces the domain's cookies with the snapshot stored under `key`.
    ///
    /// Every removal completes before the first insertion starts.
    pub async fn restore_snapshot(&self, key: &str) -> Result<(), CookieError> {
        let session = self.config.get().session;
        if !session.persist_cookies {
            return Ok(());
        }
        let cached = self.lock_cache().get(key).cloned();
        let Some(cookies) = cached else {
            return Ok(());
        };
        if cookies.is_empty() {
            return Ok(());
        }

        let stale = self
            .jar
            .get(&CookieFilter::domain(&session.cookie_domain))
            .await?;
        self.remove_all(&stale).await?;

        for cookie in &cookies {
            self.jar.set(cookie).await?;
        }
        debug!(key, count = cookies.len(), "restored cookie snapshot");
        Ok(())
    }

    pub fn drop_snapshot(&self, key: &str) {
        self.lock_cache().remove(key);
        self.persist();
    }

    /// Forgets the snapshot for `key` (or every snapshot), then wipes the
    /// whole partition regardless of domain.
    pub async fn clear_cookies(&self, key: Option<&str>) -> Result<(), CookieError> {
        {
            let mut cache = self.lock_cache();
            match key {
                Some(key) => {
                    cache.remove(key);
                }
                None => cache.clear(),
            }
        }
        self.persist();

        let every = self.jar.get(&CookieFilter::default()).await?;
        self.remove_all(&every).await?;
        info!(removed = every.len(), "cleared partition cookies");
        Ok(())
    }

    pub async fn sync_across_tabs(&self) -> Result<(), CookieError> {
        if !self.config.get().session.share_across_tabs {
            return Ok(());
        }
        self.jar.flush().await
    }

    pub fn has_snapshot(&self, key: &str) -> bool {
        self.lock_cache().contains_key(key)
    }

    pub fn snapshot(&self, key: &str) -> Option<Vec<StoredCookie>> {
        self.lock_cache().get(key).cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.lock_cache().len()
    }

    /// Writes the cache to the durable store one final time.
    pub fn dispose(&self) {
        self.persist();
    }

    async fn remove_all(&self, cookies: &[StoredCookie]) -> Result<(), CookieError> {
        let targets: Vec<(String, &str)> = cookies
            .iter()
            .map(|cookie| (cookie.removal_url(), cookie.name.as_str()))
            .collect();
        try_join_all(targets.iter().map(|(url, name)| self.jar.remove(url, name))).await?;
        Ok(())
    }

    fn persist(&self) {
        if !self.config.get().session.persist_cookies {
            return;
        }
        let value = match serde_json::to_value(&*self.lock_cache()) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to encode cookie snapshots");
                return;
            }
        };
        if let Err(e) = self
            .store
            .set(SESSION_STATE_NAMESPACE, SESSION_STATE_KEY, &value)
        {
            warn!(error = %e, "failed to save cookie snapshots");
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, SnapshotMap> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_persisted(store: &dyn KeyValueStore) -> SnapshotMap {
    match store.get(SESSION_STATE_NAMESPACE, SESSION_STATE_KEY) {
        Ok(Some(value)) => match serde_json::from_value::<SnapshotMap>(value) {
            Ok(map) => {
                info!(count = map.len(), "restored cookie snapshots from disk");
                map
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable cookie snapshots");
                SnapshotMap::new()
            }
        },
        Ok(None) => SnapshotMap::new(),
        Err(e) => {
            warn!(error = %e, "failed to load cookie snapshots");
            SnapshotMap::new()
        }
    }
}

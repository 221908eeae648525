//! Tab Registry.
//!
//! Sole owner of the open tab set and the active-tab pointer. Every mutation
//! is applied in memory first, then the new snapshot is handed to subscribers,
//! then a debounced write of the full state is scheduled on the durable store.
//! Storage faults are logged and never surface to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::KeyValueStore;
use crate::services::config_service::SharedConfig;
use crate::types::tab::{Tab, TabMetaUpdate, TabSnapshot};

pub const TAB_STATE_NAMESPACE: &str = "tab-state";
pub const TAB_STATE_KEY: &str = "tabState";

/// Quiet period before a burst of mutations is written out.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

pub const DEFAULT_TAB_TITLE: &str = "New Tab";

type Listener = Arc<dyn Fn(&TabSnapshot) + Send + Sync>;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

struct RegistryState {
    tabs: Vec<Tab>,
    active_tab_id: Option<String>,
}

impl RegistryState {
    fn empty() -> Self {
        Self {
            tabs: Vec::new(),
            active_tab_id: None,
        }
    }

    fn snapshot(&self) -> TabSnapshot {
        TabSnapshot {
            tabs: self.tabs.clone(),
            active_tab_id: self.active_tab_id.clone(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    fn tab_mut(&mut self, id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    fn insert_tab(&mut self, url: &str, now: i64) -> String {
        let id = Uuid::new_v4().to_string();
        self.tabs.push(Tab {
            id: id.clone(),
            title: DEFAULT_TAB_TITLE.to_string(),
            url: url.to_string(),
            favicon: None,
            is_active: false,
            is_suspended: false,
            is_loading: true,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Moves the active flag to `id` and clears its suspension.
    /// The caller guarantees `id` exists.
    fn activate(&mut self, id: &str, now: i64) {
        if let Some(previous) = self.active_tab_id.take() {
            if previous != id {
                if let Some(tab) = self.tab_mut(&previous) {
                    tab.is_active = false;
                    tab.updated_at = now;
                }
            }
        }
        if let Some(tab) = self.tab_mut(id) {
            tab.is_active = true;
            tab.is_suspended = false;
            tab.updated_at = now;
            self.active_tab_id = Some(id.to_string());
        }
    }

    fn open_default(&mut self, home_url: &str, now: i64) {
        let id = self.insert_tab(home_url, now);
        self.activate(&id, now);
    }
}

fn load_persisted(store: &dyn KeyValueStore) -> Option<TabSnapshot> {
    match store.get(TAB_STATE_NAMESPACE, TAB_STATE_KEY) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "discarding unreadable tab state");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "failed to read persisted tab state");
            None
        }
    }
}

/// Rebuilds the in-memory state from the store. Returns `true` in the second
/// slot when a default tab had to be opened instead.
fn restore(store: &dyn KeyValueStore, home_url: &str) -> (RegistryState, bool) {
    let mut state = RegistryState::empty();

    if let Some(saved) = load_persisted(store) {
        for mut tab in saved.tabs {
            if state.position(&tab.id).is_some() {
                continue;
            }
            tab.is_loading = false;
            tab.is_active = false;
            state.tabs.push(tab);
        }

        if !state.tabs.is_empty() {
            let active_id = saved
                .active_tab_id
                .filter(|id| state.position(id).is_some())
                .unwrap_or_else(|| state.tabs[0].id.clone());
            if let Some(tab) = state.tab_mut(&active_id) {
                tab.is_active = true;
                tab.is_suspended = false;
            }
            state.active_tab_id = Some(active_id);
            info!(count = state.tabs.len(), "restored tabs from previous session");
            return (state, false);
        }
    }

    state.open_default(home_url, now_millis());
    (state, true)
}

/// Keeps a listener attached; dropping it detaches the listener.
pub struct Subscription {
    registry: Weak<TabRegistry>,
    id: u64,
}

impl Subscription {
    /// Detaches the listener now instead of at the end of the scope.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_listener(self.id);
        }
    }
}

pub struct TabRegistry {
    state: Mutex<RegistryState>,
    /// Held from a mutation through its notification so listeners observe
    /// snapshots in the order the mutations were applied.
    notify_order: Mutex<()>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    pending_write: Mutex<Option<JoinHandle<()>>>,
    store: Arc<dyn KeyValueStore>,
    config: SharedConfig,
    weak_self: Weak<TabRegistry>,
}

impl TabRegistry {
    /// Restores the registry from `store`, falling back to a single tab on the
    /// configured home page when nothing usable was persisted.
    pub fn new(store: Arc<dyn KeyValueStore>, config: SharedConfig) -> Arc<Self> {
        let home_url = config.get().general.home_url;
        let (state, opened_default) = restore(store.as_ref(), &home_url);

        let registry = Arc::new_cyclic(|weak_self| Self {
            state: Mutex::new(state),
            notify_order: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            pending_write: Mutex::new(None),
            store,
            config,
            weak_self: weak_self.clone(),
        });
        if opened_default {
            registry.schedule_persist();
        }
        registry
    }

    /// Opens a tab on `url` (home page when `None`) and activates it.
    pub fn create_tab(&self, url: Option<&str>) -> TabSnapshot {
        let url = match url {
            Some(url) => url.to_string(),
            None => self.config.get().general.home_url,
        };
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let now = now_millis();
            let id = state.insert_tab(&url, now);
            state.activate(&id, now);
            debug!(tab_id = %id, url = %url, "tab created");
            state.snapshot()
        };
        self.commit(order, snapshot, true)
    }

    /// Closes a tab. An active tab hands over to the tab after it, else the
    /// one before it; closing the last tab opens a fresh default tab.
    pub fn close_tab(&self, id: &str) -> TabSnapshot {
        let home_url = self.config.get().general.home_url;
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let Some(index) = state.position(id) else {
                return state.snapshot();
            };
            let now = now_millis();
            let was_active = state.active_tab_id.as_deref() == Some(id);

            state.tabs.remove(index);
            if was_active {
                state.active_tab_id = None;
                let neighbor = state
                    .tabs
                    .get(index)
                    .or_else(|| index.checked_sub(1).and_then(|i| state.tabs.get(i)))
                    .map(|t| t.id.clone());
                if let Some(neighbor) = neighbor {
                    state.activate(&neighbor, now);
                }
            }
            if state.tabs.is_empty() {
                state.open_default(&home_url, now);
            }
            debug!(tab_id = %id, "tab closed");
            state.snapshot()
        };
        self.commit(order, snapshot, true)
    }

    pub fn set_active_tab(&self, id: &str) -> TabSnapshot {
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            if state.position(id).is_none() {
                return state.snapshot();
            }
            state.activate(id, now_millis());
            state.snapshot()
        };
        self.commit(order, snapshot, true)
    }

    pub fn navigate_tab(&self, id: &str, url: &str) -> TabSnapshot {
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let Some(tab) = state.tab_mut(id) else {
                return state.snapshot();
            };
            tab.url = url.to_string();
            tab.is_loading = true;
            tab.updated_at = now_millis();
            state.snapshot()
        };
        self.commit(order, snapshot, true)
    }

    /// Merges content-originated metadata; absent fields are left as they are.
    pub fn update_tab_meta(&self, id: &str, update: TabMetaUpdate) -> TabSnapshot {
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let Some(tab) = state.tab_mut(id) else {
                return state.snapshot();
            };
            if let Some(title) = update.title {
                tab.title = title;
            }
            if let Some(favicon) = update.favicon {
                tab.favicon = Some(favicon);
            }
            if let Some(url) = update.url {
                tab.url = url;
            }
            if let Some(is_loading) = update.is_loading {
                tab.is_loading = is_loading;
            }
            tab.updated_at = now_millis();
            state.snapshot()
        };
        self.commit(order, snapshot, true)
    }

    /// Flags a background tab as suspended. Unloading its content is left to
    /// whoever observes the notification. The active tab is never suspended.
    pub fn mark_suspended(&self, id: &str) -> TabSnapshot {
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let Some(tab) = state.tab_mut(id) else {
                return state.snapshot();
            };
            if tab.is_active {
                debug!(tab_id = %id, "refusing to suspend the active tab");
                return state.snapshot();
            }
            tab.is_suspended = true;
            tab.updated_at = now_millis();
            state.snapshot()
        };
        self.commit(order, snapshot, false)
    }

    /// Clears suspension and flags the tab as loading; reloading is up to the caller.
    pub fn resume_tab(&self, id: &str) -> TabSnapshot {
        let order = self.lock_order();
        let snapshot = {
            let mut state = self.lock_state();
            let Some(tab) = state.tab_mut(id) else {
                return state.snapshot();
            };
            tab.is_suspended = false;
            tab.is_loading = true;
            tab.updated_at = now_millis();
            state.snapshot()
        };
        self.commit(order, snapshot, false)
    }

    pub fn get_snapshot(&self) -> TabSnapshot {
        self.lock_state().snapshot()
    }

    pub fn get_tab(&self, id: &str) -> Option<Tab> {
        self.lock_state().tabs.iter().find(|t| t.id == id).cloned()
    }

    pub fn tab_count(&self) -> usize {
        self.lock_state().tabs.len()
    }

    /// Registers a listener called with the new snapshot after every mutation.
    /// Listeners may read the registry but must not mutate it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TabSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push((id, Arc::new(listener)));
        Subscription {
            registry: self.weak_self.clone(),
            id,
        }
    }

    /// Cancels any pending debounced write and writes the state immediately.
    pub fn dispose(&self) {
        if let Some(handle) = self
            .pending_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.persist_now();
    }

    /// Notifies listeners while `order` is still held, then releases it
    /// before scheduling any storage work.
    fn commit(&self, order: MutexGuard<'_, ()>, snapshot: TabSnapshot, persist: bool) -> TabSnapshot {
        self.emit(&snapshot);
        drop(order);
        if persist {
            self.schedule_persist();
        }
        snapshot
    }

    fn emit(&self, snapshot: &TabSnapshot) {
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn remove_listener(&self, id: u64) {
        self.lock_listeners().retain(|(listener_id, _)| *listener_id != id);
    }

    /// Restarts the quiet period. Without a tokio runtime the write happens inline.
    fn schedule_persist(&self) {
        let mut pending = self
            .pending_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        match Handle::try_current() {
            Ok(runtime) => {
                let registry = self.weak_self.clone();
                *pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(PERSIST_DEBOUNCE).await;
                    if let Some(registry) = registry.upgrade() {
                        registry.persist_now();
                    }
                }));
            }
            Err(_) => {
                drop(pending);
                self.persist_now();
            }
        }
    }

    fn persist_now(&self) {
        let snapshot = self.get_snapshot();
        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to encode tab state");
                return;
            }
        };
        match self.store.set(TAB_STATE_NAMESPACE, TAB_STATE_KEY, &value) {
            Ok(()) => debug!(tabs = snapshot.tabs.len(), "tab state saved"),
            Err(e) => warn!(error = %e, "failed to save tab state"),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_order(&self) -> MutexGuard<'_, ()> {
        self.notify_order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Shell core for SeekShell.
//!
//! Central struct holding the tab registry, session snapshot store and
//! resource governor, and the command surface the presentation layer drives.
//! Every component is built once here and handed its collaborators explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::database::{KeyValueStore, SqliteStore};
use crate::managers::session_store::SessionSnapshotStore;
use crate::managers::tab_registry::{Subscription, TabRegistry};
use crate::services::config_service::ConfigService;
use crate::services::cookie_jar::{CookieJar, MemoryCookieJar, SHARED_PARTITION};
use crate::services::notifier::{ChannelNotifier, ShellNotifier};
use crate::services::resource_governor::ResourceGovernor;
use crate::services::resource_probe::{ProcessProbe, ResourceProbe};
use crate::types::errors::{ConfigError, CookieError, ShellError};
use crate::types::event::{RefreshRequest, ReloadReason, ShellEvent};
use crate::types::resource::{GovernorStats, PowerEvent};
use crate::types::settings::ShellConfig;
use crate::types::tab::{Tab, TabMetaUpdate, TabSnapshot};

/// File name of the durable store inside the data directory.
pub const DATABASE_FILE: &str = "seekshell.db";

const POWER_CHANNEL_CAPACITY: usize = 8;

/// Collaborators the shell is assembled from.
pub struct ShellComponents {
    pub config: ConfigService,
    pub store: Arc<dyn KeyValueStore>,
    pub jar: Arc<dyn CookieJar>,
    pub probe: Arc<dyn ResourceProbe>,
    pub notifier: Arc<dyn ShellNotifier>,
}

pub struct Shell {
    config: ConfigService,
    registry: Arc<TabRegistry>,
    sessions: Arc<SessionSnapshotStore>,
    governor: Arc<ResourceGovernor>,
    notifier: Arc<dyn ShellNotifier>,
    power: broadcast::Sender<PowerEvent>,
    _tab_updates: Subscription,
}

impl Shell {
    /// Opens the shell on disk: config from `config_path` (platform default
    /// when `None`), database in `data_dir`, in-process cookie partition and
    /// process probe. Returns the receiving end of the notification channel.
    pub fn open(
        data_dir: &Path,
        config_path: Option<PathBuf>,
    ) -> Result<(Self, UnboundedReceiver<ShellEvent>), ShellError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| ShellError::DataDir(format!("{}: {}", data_dir.display(), e)))?;

        let config = ConfigService::new(config_path);
        config.load()?;
        let store = Arc::new(SqliteStore::open(data_dir.join(DATABASE_FILE))?);
        let (notifier, events) = ChannelNotifier::new();

        let shell = Self::with_components(ShellComponents {
            config,
            store,
            jar: Arc::new(MemoryCookieJar::new(SHARED_PARTITION)),
            probe: Arc::new(ProcessProbe::new()),
            notifier: Arc::new(notifier),
        });
        Ok((shell, events))
    }

    /// Wires the components together. Tab state and cookie snapshots are
    /// restored from the store here.
    pub fn with_components(components: ShellComponents) -> Self {
        let ShellComponents {
            config,
            store,
            jar,
            probe,
            notifier,
        } = components;
        let shared = config.shared();

        let registry = TabRegistry::new(store.clone(), shared.clone());
        let sessions = Arc::new(SessionSnapshotStore::new(jar, store, shared.clone()));
        let (power, power_events) = broadcast::channel(POWER_CHANNEL_CAPACITY);
        let governor = ResourceGovernor::new(
            registry.clone(),
            sessions.clone(),
            notifier.clone(),
            probe,
            shared,
            power_events,
        );

        let forward = notifier.clone();
        let tab_updates = registry.subscribe(move |snapshot| {
            forward.notify(ShellEvent::TabStateChanged(snapshot.clone()));
        });

        info!(
            tabs = registry.tab_count(),
            snapshots = sessions.snapshot_count(),
            "shell initialized"
        );

        Self {
            config,
            registry,
            sessions,
            governor,
            notifier,
            power,
            _tab_updates: tab_updates,
        }
    }

    /// Starts the resource governor. Must run inside a tokio runtime.
    pub fn startup(&self) {
        self.governor.start();
    }

    /// Stops the governor and flushes tab state and cookie snapshots.
    pub fn shutdown(&self) {
        self.governor.dispose();
        self.registry.dispose();
        self.sessions.dispose();
        info!("shell shut down");
    }

    pub fn registry(&self) -> &Arc<TabRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionSnapshotStore> {
        &self.sessions
    }

    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    // ─── Tabs ───

    pub fn list_tabs(&self) -> TabSnapshot {
        self.registry.get_snapshot()
    }

    pub fn get_tab(&self, id: &str) -> Option<Tab> {
        self.registry.get_tab(id)
    }

    pub fn create_tab(&self, url: Option<&str>) -> TabSnapshot {
        self.registry.create_tab(url)
    }

    /// Closes a tab and forgets its cookie snapshot and resource history.
    pub fn close_tab(&self, id: &str) -> TabSnapshot {
        let existed = self.registry.get_tab(id).is_some();
        let snapshot = self.registry.close_tab(id);
        if existed {
            self.sessions.drop_snapshot(id);
            self.governor.clear_history(id);
        }
        snapshot
    }

    pub fn activate_tab(&self, id: &str) -> TabSnapshot {
        self.registry.set_active_tab(id)
    }

    pub fn navigate_tab(&self, id: &str, url: &str) -> TabSnapshot {
        self.registry.navigate_tab(id, url)
    }

    pub fn update_tab_meta(&self, id: &str, update: TabMetaUpdate) -> TabSnapshot {
        self.registry.update_tab_meta(id, update)
    }

    /// Reloads a tab, resuming it if it was suspended.
    ///
    /// Cookies are captured and then restored around the resume, except for
    /// resource-monitor and resume reloads where only the restore runs. A
    /// cookie jar failure aborts before the tab is resumed.
    pub async fn refresh_tab(&self, request: RefreshRequest) -> Result<TabSnapshot, CookieError> {
        if request.id.is_empty() {
            return Ok(self.registry.get_snapshot());
        }
        let Some(tab) = self.registry.get_tab(&request.id) else {
            debug!(tab_id = %request.id, "refresh for unknown tab ignored");
            return Ok(self.registry.get_snapshot());
        };

        let reason = request.reason.unwrap_or_default();
        if !matches!(reason, ReloadReason::ResourceMonitor | ReloadReason::Resume) {
            self.sessions.capture_snapshot(&tab.id).await?;
        }
        self.sessions.restore_snapshot(&tab.id).await?;

        let snapshot = self.registry.resume_tab(&tab.id);
        self.notifier.notify(ShellEvent::Reload {
            id: tab.id.clone(),
            url: request.url.unwrap_or(tab.url),
            mode: request.mode.unwrap_or_default(),
            reason,
        });
        Ok(snapshot)
    }

    // ─── Session ───

    pub async fn clear_cookies(&self, key: Option<&str>) -> Result<(), CookieError> {
        self.sessions.clear_cookies(key).await
    }

    pub async fn sync_sessions(&self) -> Result<(), CookieError> {
        self.sessions.sync_across_tabs().await
    }

    // ─── Config ───

    pub fn config(&self) -> ShellConfig {
        self.config.get()
    }

    pub fn set_config_value(&self, key: &str, value: Value) -> Result<ShellConfig, ConfigError> {
        let config = self.config.set_value(key, value)?;
        self.restart_governor_if_running();
        Ok(config)
    }

    pub fn update_config(&self, partial: &Value) -> Result<ShellConfig, ConfigError> {
        let config = self.config.update(partial)?;
        self.restart_governor_if_running();
        Ok(config)
    }

    pub fn reset_config(&self) -> Result<ShellConfig, ConfigError> {
        let config = self.config.reset()?;
        self.restart_governor_if_running();
        Ok(config)
    }

    // ─── Power ───

    /// Forwards an OS power transition to the governor.
    pub fn power_event(&self, event: PowerEvent) {
        if self.power.send(event).is_err() {
            debug!(?event, "no power listener attached; event dropped");
        }
    }

    pub fn governor_stats(&self) -> GovernorStats {
        self.governor.stats()
    }

    fn restart_governor_if_running(&self) {
        if self.governor.is_running() {
            self.governor.start();
        }
    }
}

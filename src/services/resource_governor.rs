//! Resource Governor.
//!
//! Polls resource usage on a timer and, while a configured limit is exceeded,
//! suspends the background tab with the highest score: cookies are captured,
//! the tab is flagged suspended and the presentation layer is told to unload
//! it. At most one suspension happens per [`MIN_SUSPENSION_INTERVAL`].
//!
//! Lifecycle: `stopped -> running` on [`ResourceGovernor::start`],
//! `running -> stopped` on [`ResourceGovernor::stop`] or an OS suspend,
//! and back on an OS resume. [`ResourceGovernor::dispose`] is terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::managers::session_store::SessionSnapshotStore;
use crate::managers::tab_registry::TabRegistry;
use crate::services::config_service::SharedConfig;
use crate::services::notifier::ShellNotifier;
use crate::services::resource_probe::ResourceProbe;
use crate::types::errors::CookieError;
use crate::types::event::{ShellEvent, UnloadReason};
use crate::types::resource::{
    GovernorStats, PowerEvent, ResourceHistory, ResourceMeasurement, ResourceSample,
};
use crate::types::tab::Tab;

/// Minimum spacing between two automatic suspensions.
pub const MIN_SUSPENSION_INTERVAL: Duration = Duration::from_millis(30_000);

const AGE_SCORE_CAP: f64 = 10.0;

/// What a single check decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    WithinLimits,
    Throttled,
    NoCandidate,
    Suspended(String),
    Failed,
}

/// Ranks a suspension candidate: minutes since its history was last checked
/// (capped at 10) plus its average memory / 100 and average CPU / 10.
/// A tab with no history scores zero.
pub fn suspension_score(history: Option<&ResourceHistory>, now: Instant) -> f64 {
    let Some(history) = history else {
        return 0.0;
    };
    let idle_minutes = now.saturating_duration_since(history.last_check()).as_millis() as f64 / 60_000.0;
    let age_score = idle_minutes.min(AGE_SCORE_CAP);
    let resource_score = history.avg_memory_mb() / 100.0 + history.avg_cpu_percent() / 10.0;
    age_score + resource_score
}

/// Picks the highest-scoring tab that is neither active nor suspended.
/// Ties go to the tab that comes first.
pub fn select_candidate<'a>(
    tabs: &'a [Tab],
    history: &HashMap<String, ResourceHistory>,
    now: Instant,
) -> Option<&'a Tab> {
    let mut best: Option<(&Tab, f64)> = None;
    for tab in tabs.iter().filter(|t| !t.is_active && !t.is_suspended) {
        let score = suspension_score(history.get(&tab.id), now);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((tab, score)),
        }
    }
    best.map(|(tab, _)| tab)
}

#[derive(Default)]
struct GovernorState {
    history: HashMap<String, ResourceHistory>,
    consecutive_suspensions: u32,
    last_suspension_at: Option<Instant>,
}

/// A running timer loop. The loop exits at its next wait once `stop` is
/// signalled or dropped; a tick already running is left to finish.
struct TimerRun {
    stop: watch::Sender<bool>,
    _task: JoinHandle<()>,
}

enum PowerListener {
    Pending(broadcast::Receiver<PowerEvent>),
    Attached(JoinHandle<()>),
    Detached,
}

pub struct ResourceGovernor {
    registry: Arc<TabRegistry>,
    sessions: Arc<SessionSnapshotStore>,
    notifier: Arc<dyn ShellNotifier>,
    probe: Arc<dyn ResourceProbe>,
    config: SharedConfig,
    state: Mutex<GovernorState>,
    timer: Mutex<Option<TimerRun>>,
    power: Mutex<PowerListener>,
    weak_self: Weak<ResourceGovernor>,
}

impl ResourceGovernor {
    pub fn new(
        registry: Arc<TabRegistry>,
        sessions: Arc<SessionSnapshotStore>,
        notifier: Arc<dyn ShellNotifier>,
        probe: Arc<dyn ResourceProbe>,
        config: SharedConfig,
        power_events: broadcast::Receiver<PowerEvent>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            registry,
            sessions,
            notifier,
            probe,
            config,
            state: Mutex::new(GovernorState::default()),
            timer: Mutex::new(None),
            power: Mutex::new(PowerListener::Pending(power_events)),
            weak_self: weak_self.clone(),
        })
    }

    /// Starts (or restarts) the polling timer and attaches the power listener
    /// on first use. Must be called inside a tokio runtime.
    pub fn start(&self) {
        self.stop();

        if matches!(*self.lock_power(), PowerListener::Detached) {
            warn!("resource governor was disposed; ignoring start");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("resource governor needs a tokio runtime; not started");
            return;
        };

        let period = Duration::from_millis(self.config.get().resource_limits.check_interval.max(1));
        let governor = self.weak_self.clone();
        let (stop, mut stopped) = watch::channel(false);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {}
                }
                let Some(governor) = governor.upgrade() else {
                    break;
                };
                governor.check_and_act().await;
            }
        });
        *self.lock_timer() = Some(TimerRun { stop, _task: task });
        self.attach_power_listener(&runtime);
        debug!(interval_ms = period.as_millis() as u64, "resource governor started");
    }

    /// Cancels the timer. A tick already in progress runs to completion and
    /// no further tick starts.
    pub fn stop(&self) {
        if let Some(run) = self.lock_timer().take() {
            let _ = run.stop.send(true);
            debug!("resource governor stopped");
        }
    }

    /// Stops the timer and detaches the power listener for good.
    pub fn dispose(&self) {
        self.stop();
        let previous = std::mem::replace(&mut *self.lock_power(), PowerListener::Detached);
        if let PowerListener::Attached(handle) = previous {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer().is_some()
    }

    /// One pass of measure, decide and act.
    pub async fn check_and_act(&self) -> TickOutcome {
        let limits = self.config.get().resource_limits;

        let tabs = self.registry.get_snapshot().tabs;
        for sample in self.probe.tab_samples(&tabs).await {
            self.record_sample(sample);
        }

        let usage = match self.probe.measure().await {
            Ok(usage) => usage,
            Err(e) => {
                debug!(error = %e, "resource measurement failed; treating as idle");
                ResourceMeasurement::default()
            }
        };
        let memory_mb = usage.resident_memory_mb;
        let cpu_percent = usage.cpu_percent();

        if memory_mb <= limits.max_memory_mb as f64 && cpu_percent <= limits.max_cpu_percent {
            self.lock_state().consecutive_suspensions = 0;
            return TickOutcome::WithinLimits;
        }

        let now = Instant::now();
        let candidate = {
            let state = self.lock_state();
            if let Some(last) = state.last_suspension_at {
                if now.saturating_duration_since(last) < MIN_SUSPENSION_INTERVAL {
                    return TickOutcome::Throttled;
                }
            }
            let snapshot = self.registry.get_snapshot();
            select_candidate(&snapshot.tabs, &state.history, now).map(|t| t.id.clone())
        };
        let Some(tab_id) = candidate else {
            return TickOutcome::NoCandidate;
        };

        info!(tab_id = %tab_id, memory_mb, cpu_percent, "resource limit exceeded; suspending tab");
        match self.suspend(&tab_id).await {
            Ok(()) => {
                let mut state = self.lock_state();
                state.consecutive_suspensions += 1;
                state.last_suspension_at = Some(now);
                TickOutcome::Suspended(tab_id)
            }
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "automatic suspension failed");
                TickOutcome::Failed
            }
        }
    }

    /// Appends a sample to its tab's history.
    pub fn record_sample(&self, sample: ResourceSample) {
        let mut state = self.lock_state();
        state
            .history
            .entry(sample.tab_id.clone())
            .or_insert_with(|| ResourceHistory::new(sample.taken_at))
            .push(sample);
    }

    /// Forgets the history of a closed tab.
    pub fn clear_history(&self, tab_id: &str) {
        self.lock_state().history.remove(tab_id);
    }

    pub fn stats(&self) -> GovernorStats {
        let state = self.lock_state();
        GovernorStats {
            tracked_tabs: state.history.len(),
            tabs_with_samples: state.history.values().filter(|h| !h.is_empty()).count(),
            consecutive_suspensions: state.consecutive_suspensions,
        }
    }

    async fn suspend(&self, tab_id: &str) -> Result<(), CookieError> {
        self.sessions.capture_snapshot(tab_id).await?;
        self.registry.mark_suspended(tab_id);
        self.notifier.notify(ShellEvent::ForceUnload {
            id: tab_id.to_string(),
            reason: UnloadReason::ResourceLimit,
        });
        Ok(())
    }

    fn attach_power_listener(&self, runtime: &Handle) {
        let mut power = self.lock_power();
        if !matches!(*power, PowerListener::Pending(_)) {
            return;
        }
        let PowerListener::Pending(mut events) = std::mem::replace(&mut *power, PowerListener::Detached)
        else {
            return;
        };

        let governor = self.weak_self.clone();
        let handle = runtime.spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "power listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(governor) = governor.upgrade() else {
                    break;
                };
                match event {
                    PowerEvent::Suspend => {
                        info!("system suspending; pausing resource governor");
                        governor.stop();
                    }
                    PowerEvent::Resume => {
                        info!("system resumed; restarting resource governor");
                        governor.start();
                    }
                }
            }
        });
        *power = PowerListener::Attached(handle);
    }

    fn lock_state(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<TimerRun>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_power(&self) -> MutexGuard<'_, PowerListener> {
        self.power.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

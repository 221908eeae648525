//! Unit tests for the RPC handler: every JSON-RPC method dispatched by
//! `handle_method`, driven through a shell opened on a temporary directory.

use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use seekshell::app::Shell;
use seekshell::rpc_handler::handle_method;
use seekshell::types::event::{ReloadMode, ReloadReason, ShellEvent};

/// Opens a shell whose database and config live in a temp directory.
fn setup() -> (Shell, UnboundedReceiver<ShellEvent>, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let (shell, events) = open_in(&tmp);
    (shell, events, tmp)
}

fn open_in(tmp: &TempDir) -> (Shell, UnboundedReceiver<ShellEvent>) {
    Shell::open(tmp.path(), Some(tmp.path().join("config.json"))).expect("Failed to open shell")
}

fn drain(events: &mut UnboundedReceiver<ShellEvent>) -> Vec<ShellEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn reloads(events: &mut UnboundedReceiver<ShellEvent>) -> Vec<ShellEvent> {
    drain(events)
        .into_iter()
        .filter(|e| matches!(e, ShellEvent::Reload { .. }))
        .collect()
}

async fn call(shell: &Shell, method: &str, params: Value) -> Value {
    handle_method(shell, method, &params)
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
}

async fn new_tab(shell: &Shell, url: &str) -> String {
    let res = call(shell, "tabs.create", json!({"url": url})).await;
    res["activeTabId"].as_str().unwrap().to_string()
}

// ─── Ping ───

#[tokio::test]
async fn test_ping() {
    let (shell, _events, _tmp) = setup();
    let res = call(&shell, "ping", json!({})).await;
    assert_eq!(res["pong"], json!(true));
    assert_eq!(res["version"], json!(env!("CARGO_PKG_VERSION")));
}

// ─── Unknown method ───

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (shell, _events, _tmp) = setup();
    let res = handle_method(&shell, "nonexistent.method", &json!({})).await;
    assert!(res.unwrap_err().contains("unknown method"));
}

// ─── Tabs ───

#[tokio::test]
async fn test_tabs_list_starts_with_home_tab() {
    let (shell, _events, _tmp) = setup();
    let res = call(&shell, "tabs.list", json!({})).await;
    let tabs = res["tabs"].as_array().unwrap();
    assert_eq!(tabs.len(), 1);
    assert_eq!(tabs[0]["url"], json!("https://nodeseek.com/"));
    assert_eq!(tabs[0]["title"], json!("New Tab"));
    assert_eq!(res["activeTabId"], tabs[0]["id"]);
}

#[tokio::test]
async fn test_tabs_create_emits_state_event() {
    let (shell, mut events, _tmp) = setup();
    drain(&mut events);

    let id = new_tab(&shell, "https://a.example/").await;

    let seen = drain(&mut events);
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        ShellEvent::TabStateChanged(snapshot) => {
            assert_eq!(snapshot.active_tab_id.as_deref(), Some(id.as_str()));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_tabs_create_rejects_bad_url() {
    let (shell, _events, _tmp) = setup();
    let res = handle_method(&shell, "tabs.create", &json!({"url": "javascript:alert(1)"})).await;
    assert!(res.unwrap_err().contains("invalid url"));
}

#[tokio::test]
async fn test_tabs_get() {
    let (shell, _events, _tmp) = setup();
    let id = new_tab(&shell, "https://a.example/").await;
    let res = call(&shell, "tabs.get", json!({"id": id})).await;
    assert_eq!(res["url"], json!("https://a.example/"));
    assert_eq!(call(&shell, "tabs.get", json!({"id": "missing"})).await, Value::Null);
}

#[tokio::test]
async fn test_tabs_navigate_requires_params() {
    let (shell, _events, _tmp) = setup();
    let res = handle_method(&shell, "tabs.navigate", &json!({"url": "https://a.example/"})).await;
    assert_eq!(res.unwrap_err(), "missing id");
}

#[tokio::test]
async fn test_tabs_navigate_then_update_meta() {
    let (shell, _events, _tmp) = setup();
    let id = new_tab(&shell, "https://start.example/").await;
    call(&shell, "tabs.navigate", json!({"id": id, "url": "https://a.example/"})).await;

    let res = call(
        &shell,
        "tabs.update_meta",
        json!({"id": id, "title": "A", "isLoading": false}),
    )
    .await;
    let tab = res["tabs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == json!(id))
        .unwrap();
    assert_eq!(tab["title"], json!("A"));
    assert_eq!(tab["isLoading"], json!(false));
    assert_eq!(tab["url"], json!("https://a.example/"));
}

#[tokio::test]
async fn test_tabs_activate_and_close() {
    let (shell, _events, _tmp) = setup();
    let first = shell.list_tabs().tabs[0].id.clone();
    let second = new_tab(&shell, "https://a.example/").await;

    let res = call(&shell, "tabs.activate", json!({"id": first})).await;
    assert_eq!(res["activeTabId"], json!(first));

    let res = call(&shell, "tabs.close", json!({"id": first})).await;
    assert_eq!(res["activeTabId"], json!(second));
    assert_eq!(res["tabs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tabs_close_forgets_cookie_snapshot() {
    let (shell, _events, _tmp) = setup();
    let id = new_tab(&shell, "https://a.example/").await;
    call(&shell, "tabs.refresh", json!({"id": id})).await;
    assert!(shell.sessions().has_snapshot(&id));

    call(&shell, "tabs.close", json!({"id": id})).await;
    assert!(!shell.sessions().has_snapshot(&id));
}

// ─── Refresh ───

#[tokio::test]
async fn test_refresh_resumes_suspended_tab_with_defaults() {
    let (shell, mut events, _tmp) = setup();
    let background = shell.list_tabs().tabs[0].id.clone();
    new_tab(&shell, "https://a.example/").await;
    shell.registry().mark_suspended(&background);
    drain(&mut events);

    let res = call(&shell, "tabs.refresh", json!({"id": background})).await;

    let tab = res["tabs"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == json!(background))
        .unwrap();
    assert_eq!(tab["isSuspended"], json!(false));
    assert_eq!(tab["isLoading"], json!(true));
    assert_eq!(
        reloads(&mut events),
        vec![ShellEvent::Reload {
            id: background.clone(),
            url: "https://nodeseek.com/".to_string(),
            mode: ReloadMode::Soft,
            reason: ReloadReason::User,
        }]
    );
    assert!(shell.sessions().has_snapshot(&background));
}

#[tokio::test]
async fn test_refresh_passes_mode_reason_and_url() {
    let (shell, mut events, _tmp) = setup();
    let id = new_tab(&shell, "https://a.example/").await;
    drain(&mut events);

    call(
        &shell,
        "tabs.refresh",
        json!({"id": id, "mode": "hard", "reason": "resume", "url": "https://b.example/"}),
    )
    .await;

    assert_eq!(
        reloads(&mut events),
        vec![ShellEvent::Reload {
            id: id.clone(),
            url: "https://b.example/".to_string(),
            mode: ReloadMode::Hard,
            reason: ReloadReason::Resume,
        }]
    );
}

#[tokio::test]
async fn test_refresh_from_resource_monitor_skips_capture() {
    let (shell, _events, _tmp) = setup();
    let id = new_tab(&shell, "https://a.example/").await;
    call(&shell, "tabs.refresh", json!({"id": id, "reason": "resource-monitor"})).await;
    assert!(!shell.sessions().has_snapshot(&id));
}

#[tokio::test]
async fn test_refresh_unknown_or_missing_id_emits_nothing() {
    let (shell, mut events, _tmp) = setup();
    drain(&mut events);

    let res = call(&shell, "tabs.refresh", json!({"id": "missing"})).await;
    assert_eq!(res["tabs"].as_array().unwrap().len(), 1);
    call(&shell, "tabs.refresh", json!({})).await;

    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn test_refresh_rejects_unknown_reason() {
    let (shell, _events, _tmp) = setup();
    let res = handle_method(&shell, "tabs.refresh", &json!({"id": "x", "reason": "boredom"})).await;
    assert!(res.unwrap_err().contains("invalid refresh request"));
}

// ─── Config ───

#[tokio::test]
async fn test_config_get_set_update_reset() {
    let (shell, _events, tmp) = setup();

    let res = call(&shell, "config.get", json!({})).await;
    assert_eq!(res["resourceLimits"]["maxMemoryMB"], json!(500));

    let res = call(&shell, "config.set", json!({"key": "resourceLimits.maxMemoryMB", "value": 256})).await;
    assert_eq!(res["resourceLimits"]["maxMemoryMB"], json!(256));
    assert!(tmp.path().join("config.json").exists());

    let res = call(&shell, "config.update", json!({"session": {"shareAcrossTabs": false}})).await;
    assert_eq!(res["session"]["shareAcrossTabs"], json!(false));
    assert_eq!(res["resourceLimits"]["maxMemoryMB"], json!(256));

    let res = call(&shell, "config.reset", json!({})).await;
    assert_eq!(res["resourceLimits"]["maxMemoryMB"], json!(500));
}

#[tokio::test]
async fn test_config_set_errors() {
    let (shell, _events, _tmp) = setup();
    let res = handle_method(&shell, "config.set", &json!({"key": "nope", "value": 1})).await;
    assert!(res.unwrap_err().contains("Invalid config key"));
    let res = handle_method(&shell, "config.set", &json!({"key": "general.homeUrl"})).await;
    assert_eq!(res.unwrap_err(), "missing value");
}

#[tokio::test]
async fn test_config_is_reloaded_on_open() {
    let tmp = TempDir::new().unwrap();
    {
        let (shell, _events) = open_in(&tmp);
        call(&shell, "config.set", json!({"key": "general.homeUrl", "value": "https://home.example/"})).await;
        shell.shutdown();
    }
    let (shell, _events) = open_in(&tmp);
    assert_eq!(shell.config().general.home_url, "https://home.example/");
}

// ─── Session ───

#[tokio::test]
async fn test_session_methods() {
    let (shell, _events, _tmp) = setup();
    assert_eq!(call(&shell, "session.clear_cookies", json!({})).await, json!({"ok": true}));
    assert_eq!(
        call(&shell, "session.clear_cookies", json!({"key": "t1"})).await,
        json!({"ok": true})
    );
    assert_eq!(call(&shell, "session.sync", json!({})).await, json!({"ok": true}));
}

// ─── Power and governor ───

#[tokio::test(start_paused = true)]
async fn test_power_events_toggle_governor() {
    let (shell, _events, _tmp) = setup();
    shell.startup();
    assert_eq!(call(&shell, "governor.stats", json!({})).await["running"], json!(true));

    call(&shell, "power.suspend", json!({})).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(call(&shell, "governor.stats", json!({})).await["running"], json!(false));

    call(&shell, "power.resume", json!({})).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let stats = call(&shell, "governor.stats", json!({})).await;
    assert_eq!(stats["running"], json!(true));
    assert_eq!(stats["consecutiveSuspensions"], json!(0));
    assert!(stats["trackedTabs"].is_u64());
    assert!(stats["tabsWithSamples"].is_u64());

    shell.shutdown();
    assert!(!shell.governor().is_running());
}

// ─── Lifecycle ───

#[tokio::test]
async fn test_shutdown_persists_tabs_for_next_open() {
    let tmp = TempDir::new().unwrap();
    let (ids, active) = {
        let (shell, _events) = open_in(&tmp);
        new_tab(&shell, "https://a.example/").await;
        let snapshot = shell.list_tabs();
        shell.activate_tab(&snapshot.tabs[0].id);
        shell.shutdown();
        let ids: Vec<String> = snapshot.tabs.iter().map(|t| t.id.clone()).collect();
        (ids, snapshot.tabs[0].id.clone())
    };

    let (shell, _events) = open_in(&tmp);
    let restored = shell.list_tabs();
    let restored_ids: Vec<String> = restored.tabs.iter().map(|t| t.id.clone()).collect();
    assert_eq!(restored_ids, ids);
    assert_eq!(restored.active_tab_id, Some(active));
}

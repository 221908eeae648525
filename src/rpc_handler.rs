//! RPC method handler for the SeekShell JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! command surface of the [`Shell`].

use serde::Serialize;
use serde_json::{json, Value};

use crate::app::Shell;
use crate::types::event::RefreshRequest;
use crate::types::resource::PowerEvent;
use crate::types::tab::TabMetaUpdate;

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn require_str<'a>(params: &'a Value, field: &'static str) -> Result<&'a str, String> {
    params
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", field))
}

fn check_url(url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err("invalid url: must start with http:// or https://".to_string())
    }
}

/// Dispatch a JSON-RPC method call to the shell.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(shell: &Shell, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Tabs ───
        "tabs.list" => to_json(&shell.list_tabs()),
        "tabs.get" => {
            let id = require_str(params, "id")?;
            to_json(&shell.get_tab(id))
        }
        "tabs.create" => {
            let url = params.get("url").and_then(|v| v.as_str());
            if let Some(url) = url {
                check_url(url)?;
            }
            to_json(&shell.create_tab(url))
        }
        "tabs.close" => {
            let id = require_str(params, "id")?;
            to_json(&shell.close_tab(id))
        }
        "tabs.activate" => {
            let id = require_str(params, "id")?;
            to_json(&shell.activate_tab(id))
        }
        "tabs.navigate" => {
            let id = require_str(params, "id")?;
            let url = require_str(params, "url")?;
            check_url(url)?;
            to_json(&shell.navigate_tab(id, url))
        }
        "tabs.update_meta" => {
            let id = require_str(params, "id")?;
            let update: TabMetaUpdate =
                serde_json::from_value(params.clone()).map_err(|e| format!("invalid meta: {}", e))?;
            if let Some(url) = update.url.as_deref() {
                check_url(url)?;
            }
            to_json(&shell.update_tab_meta(id, update))
        }
        "tabs.refresh" => {
            let request: RefreshRequest = serde_json::from_value(params.clone())
                .map_err(|e| format!("invalid refresh request: {}", e))?;
            let snapshot = shell.refresh_tab(request).await.map_err(|e| e.to_string())?;
            to_json(&snapshot)
        }

        // ─── Config ───
        "config.get" => to_json(&shell.config()),
        "config.update" => {
            if !params.is_object() {
                return Err("config.update expects an object".to_string());
            }
            let config = shell.update_config(params).map_err(|e| e.to_string())?;
            to_json(&config)
        }
        "config.set" => {
            let key = require_str(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let config = shell.set_config_value(key, value).map_err(|e| e.to_string())?;
            to_json(&config)
        }
        "config.reset" => {
            let config = shell.reset_config().map_err(|e| e.to_string())?;
            to_json(&config)
        }

        // ─── Session ───
        "session.clear_cookies" => {
            let key = params.get("key").and_then(|v| v.as_str());
            shell.clear_cookies(key).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "session.sync" => {
            shell.sync_sessions().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Power ───
        "power.suspend" => {
            shell.power_event(PowerEvent::Suspend);
            Ok(json!({"ok": true}))
        }
        "power.resume" => {
            shell.power_event(PowerEvent::Resume);
            Ok(json!({"ok": true}))
        }

        "governor.stats" => {
            let mut stats = to_json(&shell.governor_stats())?;
            if let Value::Object(fields) = &mut stats {
                fields.insert("running".to_string(), Value::Bool(shell.governor().is_running()));
            }
            Ok(stats)
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}

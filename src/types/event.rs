use serde::{Deserialize, Serialize};

use super::tab::TabSnapshot;

/// Why a tab's content must be unloaded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnloadReason {
    ResourceLimit,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadMode {
    #[default]
    Soft,
    Hard,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadReason {
    #[default]
    User,
    ResourceMonitor,
    Resume,
}

/// Refresh intent forwarded by the presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefreshRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: Option<ReloadMode>,
    #[serde(default)]
    pub reason: Option<ReloadReason>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Outbound notifications consumed by the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum ShellEvent {
    #[serde(rename = "tabs:state")]
    TabStateChanged(TabSnapshot),
    #[serde(rename = "tabs:force-unload")]
    ForceUnload { id: String, reason: UnloadReason },
    #[serde(rename = "tabs:reload")]
    Reload {
        id: String,
        url: String,
        mode: ReloadMode,
        reason: ReloadReason,
    },
}

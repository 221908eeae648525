use serde::{Deserialize, Serialize};

/// A single logical browsing context owned by the tab registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_suspended: bool,
    #[serde(default)]
    pub is_loading: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, bumped on every mutation.
    pub updated_at: i64,
}

/// Read-only projection of every tab (insertion order) and the active tab id.
///
/// This is also the persisted shape of the tab state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub tabs: Vec<Tab>,
    pub active_tab_id: Option<String>,
}

impl TabSnapshot {
    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id
            .as_deref()
            .and_then(|id| self.tabs.iter().find(|t| t.id == id))
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

/// Partial metadata update coming from content events (title, favicon,
/// in-page navigation, load start/stop). Only the provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabMetaUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_loading: Option<bool>,
}

use serde::{Deserialize, Serialize};

/// Top-level shell configuration, stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellConfig {
    pub general: GeneralConfig,
    pub resource_limits: ResourceLimitConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    /// Page new tabs open when no url is given.
    pub home_url: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            home_url: "https://nodeseek.com/".to_string(),
        }
    }
}

/// Thresholds driving the resource governor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceLimitConfig {
    #[serde(rename = "maxMemoryMB")]
    pub max_memory_mb: u64,
    #[serde(rename = "maxCpuPercent")]
    pub max_cpu_percent: f64,
    /// Polling period in milliseconds.
    #[serde(rename = "checkInterval")]
    pub check_interval: u64,
}

impl Default for ResourceLimitConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 500,
            max_cpu_percent: 30.0,
            check_interval: 5000,
        }
    }
}

/// Cookie snapshot behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub cookie_domain: String,
    pub persist_cookies: bool,
    pub share_across_tabs: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_domain: ".nodeseek.com".to_string(),
            persist_cookies: true,
            share_across_tabs: true,
        }
    }
}

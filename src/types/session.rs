use serde::{Deserialize, Serialize};

/// A cookie as captured from (and re-inserted into) the shared partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Seconds since the epoch; `None` for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
}

impl StoredCookie {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: Some(domain.to_string()),
            path: Some("/".to_string()),
            ..Self::default()
        }
    }

    /// Domain with any leading dot stripped.
    pub fn host(&self) -> &str {
        self.domain
            .as_deref()
            .map(|d| d.strip_prefix('.').unwrap_or(d))
            .unwrap_or("")
    }

    /// URL a cookie jar needs to address this cookie for removal.
    pub fn removal_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let path = self.path.as_deref().unwrap_or("/");
        format!("{}://{}{}", scheme, self.host(), path)
    }
}

/// Filter passed to [`crate::services::cookie_jar::CookieJar::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieFilter {
    pub domain: Option<String>,
}

impl CookieFilter {
    pub fn domain(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
        }
    }
}

//! Cookie jar of the shared browsing partition.
//!
//! The host's embedded web engine owns the real jar; [`CookieJar`] is the
//! surface the session store needs from it. [`MemoryCookieJar`] is an
//! in-process partition with the same matching rules.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::types::errors::CookieError;
use crate::types::session::{CookieFilter, StoredCookie};

/// Partition shared by every tab.
pub const SHARED_PARTITION: &str = "persist:nodeseek";

#[async_trait]
pub trait CookieJar: Send + Sync {
    /// Cookies matching `filter`; an empty filter returns every cookie.
    async fn get(&self, filter: &CookieFilter) -> Result<Vec<StoredCookie>, CookieError>;
    /// Inserts or replaces the cookie with the same name, domain and path.
    async fn set(&self, cookie: &StoredCookie) -> Result<(), CookieError>;
    /// Removes the cookie called `name` addressed by `url`.
    async fn remove(&self, url: &str, name: &str) -> Result<(), CookieError>;
    /// Writes pending cookie state to durable storage.
    async fn flush(&self) -> Result<(), CookieError>;
}

/// Returns true when `cookie_domain` equals `filter_domain` or is a subdomain
/// of it. Leading dots are ignored on both sides.
pub fn domain_matches(cookie_domain: &str, filter_domain: &str) -> bool {
    let cookie = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let filter = filter_domain.trim_start_matches('.').to_ascii_lowercase();
    if filter.is_empty() {
        return true;
    }
    cookie == filter || cookie.ends_with(&format!(".{}", filter))
}

/// Splits `scheme://host/path` into host and path (path defaults to `/`).
fn split_cookie_url(url: &str) -> Result<(String, String), CookieError> {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| CookieError::InvalidUrl(url.to_string()))?;
    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if host.is_empty() {
        return Err(CookieError::InvalidUrl(url.to_string()));
    }
    Ok((host.to_ascii_lowercase(), path.to_string()))
}

/// In-process cookie partition.
pub struct MemoryCookieJar {
    partition: String,
    cookies: Mutex<Vec<StoredCookie>>,
    flushes: AtomicUsize,
}

impl MemoryCookieJar {
    pub fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            cookies: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.cookies().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies().is_empty()
    }

    fn cookies(&self) -> MutexGuard<'_, Vec<StoredCookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCookieJar {
    fn default() -> Self {
        Self::new(SHARED_PARTITION)
    }
}

#[async_trait]
impl CookieJar for MemoryCookieJar {
    async fn get(&self, filter: &CookieFilter) -> Result<Vec<StoredCookie>, CookieError> {
        let cookies = self.cookies();
        Ok(cookies
            .iter()
            .filter(|c| match filter.domain.as_deref() {
                Some(domain) => domain_matches(c.domain.as_deref().unwrap_or(""), domain),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn set(&self, cookie: &StoredCookie) -> Result<(), CookieError> {
        if cookie.name.is_empty() {
            return Err(CookieError::Jar("cookie name cannot be empty".to_string()));
        }
        let path = cookie.path.as_deref().unwrap_or("/");
        let mut cookies = self.cookies();
        cookies.retain(|c| {
            !(c.name == cookie.name
                && c.host().eq_ignore_ascii_case(cookie.host())
                && c.path.as_deref().unwrap_or("/") == path)
        });
        cookies.push(cookie.clone());
        Ok(())
    }

    async fn remove(&self, url: &str, name: &str) -> Result<(), CookieError> {
        let (host, path) = split_cookie_url(url)?;
        self.cookies().retain(|c| {
            let cookie_path = c.path.as_deref().unwrap_or("/");
            !(c.name == name && c.host().eq_ignore_ascii_case(&host) && cookie_path == path)
        });
        Ok(())
    }

    async fn flush(&self) -> Result<(), CookieError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

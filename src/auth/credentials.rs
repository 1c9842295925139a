//! In-memory cookie jar holding the session credentials.
//!
//! The backend issues four cookies: the access and refresh JWTs plus a
//! CSRF companion for each. The client never interprets the refresh
//! token; it only checks presence, echoes cookies back, and copies the
//! matching CSRF value into the `X-CSRF-Token` header.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const CSRF_ACCESS_COOKIE: &str = "csrf_access_token";
pub const CSRF_REFRESH_COOKIE: &str = "csrf_refresh_token";

/// Every cookie that belongs to the session.
pub const AUTH_COOKIES: [&str; 4] = [
    ACCESS_TOKEN_COOKIE,
    REFRESH_TOKEN_COOKIE,
    CSRF_ACCESS_COOKIE,
    CSRF_REFRESH_COOKIE,
];

/// Which CSRF companion a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Ordinary API calls.
    Access,
    /// Calls to the refresh endpoint.
    Refresh,
}

impl TokenKind {
    fn csrf_cookie(self) -> &'static str {
        match self {
            Self::Access => CSRF_ACCESS_COOKIE,
            Self::Refresh => CSRF_REFRESH_COOKIE,
        }
    }
}

/// Shared cookie jar. Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    cookies: Arc<RwLock<BTreeMap<String, String>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from a `Cookie` request header (`a=1; b=2`).
    ///
    /// Malformed pairs and empty values are skipped.
    pub fn from_cookie_header(header: &str) -> Self {
        let store = Self::new();
        {
            let mut cookies = store.write();
            for pair in header.split(';') {
                if let Some((name, value)) = split_pair(pair) {
                    cookies.insert(name.to_owned(), value.to_owned());
                }
            }
        }
        store
    }

    /// Value of the named cookie, if present and non-empty.
    pub fn get(&self, name: &str) -> Option<String> {
        self.read().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let name = name.into();
        if value.is_empty() {
            self.write().remove(&name);
        } else {
            self.write().insert(name, value);
        }
    }

    /// Returns true if any session cookie is present.
    pub fn has_tokens(&self) -> bool {
        let cookies = self.read();
        AUTH_COOKIES.iter().any(|name| cookies.contains_key(*name))
    }

    pub fn has_access_token(&self) -> bool {
        self.read().contains_key(ACCESS_TOKEN_COOKIE)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.read().contains_key(REFRESH_TOKEN_COOKIE)
    }

    pub fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_COOKIE)
    }

    /// CSRF value to send with a request of the given kind.
    pub fn csrf_token(&self, kind: TokenKind) -> Option<String> {
        self.get(kind.csrf_cookie())
    }

    /// Render the jar as a `Cookie` request header, or `None` when empty.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.read();
        if cookies.is_empty() {
            return None;
        }
        let header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Apply one `Set-Cookie` response header.
    ///
    /// An empty value or `Max-Age=0` deletes the cookie; attributes other
    /// than `Max-Age` are ignored.
    pub fn apply_set_cookie(&self, header: &str) {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(split_pair_allow_empty) else {
            debug!("ignoring malformed Set-Cookie header");
            return;
        };

        let expired = parts.any(|attr| {
            split_pair(attr).is_some_and(|(key, val)| {
                key.eq_ignore_ascii_case("max-age") && val.parse::<i64>().is_ok_and(|age| age <= 0)
            })
        });

        let mut cookies = self.write();
        if value.is_empty() || expired {
            cookies.remove(name);
            debug!(cookie = name, "cookie removed by server");
        } else {
            cookies.insert(name.to_owned(), value.to_owned());
            debug!(cookie = name, "cookie updated by server");
        }
    }

    /// Drop every session cookie, returning the names that were present.
    pub fn clear(&self) -> Vec<String> {
        let mut cookies = self.write();
        let removed: Vec<String> = AUTH_COOKIES
            .iter()
            .filter(|name| cookies.remove(**name).is_some())
            .map(|name| (*name).to_owned())
            .collect();
        info!(removed = ?removed, "session credentials cleared");
        removed
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    split_pair_allow_empty(pair).filter(|(_, value)| !value.is_empty())
}

fn split_pair_allow_empty(pair: &str) -> Option<(&str, &str)> {
    let (name, value) = pair.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim().trim_matches('"')))
}

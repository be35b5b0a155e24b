//! Client configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Parsing goes through a lookup function so tests feed a map instead of
//! mutating the process environment. Missing or placeholder backend
//! credentials are not an error: they select demo mode.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::WallError;
use crate::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_MS, DEFAULT_RETRY_MAX_MS, RetryPolicy};
use crate::session::SpuriousSignInPolicy;
use crate::watchdog::{WatchdogConfig, WatchdogPolicy};

pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PUBLIC_PAGE_SIZE: usize = 20;
pub const DEFAULT_IMAGE_BUCKET: &str = "inspiration-images";
pub const DEFAULT_FRESHNESS_SECS: u64 = 300;
pub const DEFAULT_HIDDEN_THRESHOLD_MS: u64 = 2000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_SETTLE_MS: u64 = 1000;
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Marker used by unconfigured deployments in place of a real URL.
const PLACEHOLDER_MARKER: &str = "placeholder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCredentials {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    Live(BackendCredentials),
    Demo,
}

/// Transport-level limits for the HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallConfig {
    pub backend: BackendMode,
    pub load_timeout: Duration,
    pub public_page_size: usize,
    pub image_bucket: String,
    pub watchdog: WatchdogConfig,
    pub spurious_sign_in: SpuriousSignInPolicy,
    pub retry: RetryPolicy,
    pub session_path: Option<PathBuf>,
    /// Where confirmation emails send new users back to.
    pub redirect_to: Option<String>,
}

impl WallConfig {
    /// Build typed config from environment variables.
    ///
    /// Backend (both required for live mode):
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `WALL_LOAD_TIMEOUT_SECS`: default 10
    /// - `WALL_PUBLIC_PAGE_SIZE`: default 20
    /// - `WALL_IMAGE_BUCKET`: default `inspiration-images`
    /// - `WALL_WATCHDOG_POLICY`: `liveness` (default), `freshness`, or `hidden`
    /// - `WALL_FRESHNESS_SECS`, `WALL_HIDDEN_THRESHOLD_MS`, `WALL_DEBOUNCE_MS`,
    ///   `WALL_SETTLE_MS`, `WALL_PING_TIMEOUT_SECS`
    /// - `WALL_SPURIOUS_SIGN_IN`: `ignore` (default) or `reload`
    /// - `WALL_RETRY_ATTEMPTS`, `WALL_RETRY_BASE_MS`, `WALL_RETRY_MAX_MS`
    /// - `WALL_SESSION_PATH`: file that persists the auth session
    /// - `WALL_SITE_URL`: public site origin for sign-up confirmation links
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` for an unknown policy name.
    pub fn from_env() -> Result<Self, WallError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` for an unknown policy name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WallError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = parse_backend(lookup("SUPABASE_URL"), lookup("SUPABASE_ANON_KEY"));

        let freshness = Duration::from_secs(parse_or(&lookup, "WALL_FRESHNESS_SECS", DEFAULT_FRESHNESS_SECS));
        let hidden_threshold =
            Duration::from_millis(parse_or(&lookup, "WALL_HIDDEN_THRESHOLD_MS", DEFAULT_HIDDEN_THRESHOLD_MS));
        let ping_timeout = Duration::from_secs(parse_or(&lookup, "WALL_PING_TIMEOUT_SECS", DEFAULT_PING_TIMEOUT_SECS));
        let policy = parse_watchdog_policy(
            lookup("WALL_WATCHDOG_POLICY").as_deref(),
            freshness,
            hidden_threshold,
            ping_timeout,
        )?;
        let watchdog = WatchdogConfig {
            policy,
            debounce: Duration::from_millis(parse_or(&lookup, "WALL_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
            settle: Duration::from_millis(parse_or(&lookup, "WALL_SETTLE_MS", DEFAULT_SETTLE_MS)),
        };

        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "WALL_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS).max(1),
            base_delay: Duration::from_millis(parse_or(&lookup, "WALL_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)),
            max_delay: Duration::from_millis(parse_or(&lookup, "WALL_RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS)),
        };

        Ok(Self {
            backend,
            load_timeout: Duration::from_secs(parse_or(&lookup, "WALL_LOAD_TIMEOUT_SECS", DEFAULT_LOAD_TIMEOUT_SECS)),
            public_page_size: parse_or(&lookup, "WALL_PUBLIC_PAGE_SIZE", DEFAULT_PUBLIC_PAGE_SIZE),
            image_bucket: lookup("WALL_IMAGE_BUCKET")
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_BUCKET.to_string()),
            watchdog,
            spurious_sign_in: parse_spurious(lookup("WALL_SPURIOUS_SIGN_IN").as_deref())?,
            retry,
            session_path: lookup("WALL_SESSION_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            redirect_to: lookup("WALL_SITE_URL")
                .filter(|u| !u.trim().is_empty())
                .map(|u| format!("{}/auth/callback", u.trim().trim_end_matches('/'))),
        })
    }

    #[must_use]
    pub fn is_demo(&self) -> bool {
        matches!(self.backend, BackendMode::Demo)
    }

    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts::default()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_backend(url: Option<String>, anon_key: Option<String>) -> BackendMode {
    match (url, anon_key) {
        (Some(url), Some(anon_key))
            if !url.trim().is_empty() && !anon_key.trim().is_empty() && !url.contains(PLACEHOLDER_MARKER) =>
        {
            BackendMode::Live(BackendCredentials {
                url: url.trim().trim_end_matches('/').to_string(),
                anon_key: anon_key.trim().to_string(),
            })
        }
        _ => BackendMode::Demo,
    }
}

fn parse_watchdog_policy(
    raw: Option<&str>,
    freshness: Duration,
    hidden_threshold: Duration,
    ping_timeout: Duration,
) -> Result<WatchdogPolicy, WallError> {
    match raw.unwrap_or("liveness") {
        "liveness" => Ok(WatchdogPolicy::Liveness { window: freshness, ping_timeout }),
        "freshness" => Ok(WatchdogPolicy::Freshness { window: freshness }),
        "hidden" => Ok(WatchdogPolicy::HiddenDuration { threshold: hidden_threshold }),
        other => Err(WallError::ConfigParse(format!(
            "unknown WALL_WATCHDOG_POLICY '{other}' (expected 'liveness', 'freshness', or 'hidden')"
        ))),
    }
}

fn parse_spurious(raw: Option<&str>) -> Result<SpuriousSignInPolicy, WallError> {
    match raw.unwrap_or("ignore") {
        "ignore" => Ok(SpuriousSignInPolicy::Ignore),
        "reload" => Ok(SpuriousSignInPolicy::ForcePageReload),
        other => Err(WallError::ConfigParse(format!("unknown WALL_SPURIOUS_SIGN_IN: {other}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

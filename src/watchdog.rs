//! Visibility watchdog: refresh policy for a page returning from the background.
//!
//! DESIGN
//! ======
//! When the OS suspends a backgrounded tab, the backend's auth/realtime
//! channel can silently go stale. The watchdog turns visibility transitions
//! into an action using one configured policy:
//!
//! - `Freshness`: reload if the last successful load is older than a window.
//! - `HiddenDuration`: restart everything if the page was hidden too long.
//! - `Liveness`: ask the caller to ping the backend first; a failed ping
//!   restarts, a healthy one falls back to the freshness rule.
//!
//! All decisions take an explicit `now` so tests drive time directly.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVisibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPolicy {
    Freshness { window: Duration },
    HiddenDuration { threshold: Duration },
    Liveness { window: Duration, ping_timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub policy: WatchdogPolicy,
    /// Transitions closer than this to the previous one are ignored.
    pub debounce: Duration,
    /// Pause before a freshness reload, to skip quick tab flips.
    pub settle: Duration,
}

/// What the loader looks like at the moment of the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderStatus {
    /// The page finished its startup sequence.
    pub ready: bool,
    pub loading: bool,
    pub last_loaded: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    None,
    Reload,
    ForcePageReload,
    CheckLiveness { ping_timeout: Duration },
}

/// `true` when the data is older than `window` or was never loaded.
#[must_use]
pub fn is_stale(last_loaded: Option<Instant>, now: Instant, window: Duration) -> bool {
    last_loaded.is_none_or(|at| now.saturating_duration_since(at) > window)
}

#[derive(Debug, Clone)]
pub struct VisibilityWatchdog {
    config: WatchdogConfig,
    visibility: PageVisibility,
    last_transition: Option<Instant>,
    hidden_since: Option<Instant>,
}

impl VisibilityWatchdog {
    #[must_use]
    pub fn new(config: WatchdogConfig) -> Self {
        Self { config, visibility: PageVisibility::Visible, last_transition: None, hidden_since: None }
    }

    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visibility == PageVisibility::Visible
    }

    /// Feed one visibility transition observed at `now`.
    pub fn on_transition(&mut self, visibility: PageVisibility, now: Instant, status: &LoaderStatus) -> WatchdogAction {
        match visibility {
            PageVisibility::Hidden => {
                self.visibility = PageVisibility::Hidden;
                self.last_transition = Some(now);
                self.hidden_since.get_or_insert(now);
                WatchdogAction::None
            }
            PageVisibility::Visible => {
                self.visibility = PageVisibility::Visible;
                // Every show ends the hidden stretch, debounced or not.
                let hidden_for = self
                    .hidden_since
                    .take()
                    .map(|since| now.saturating_duration_since(since));
                if let Some(last) = self.last_transition {
                    if now.saturating_duration_since(last) < self.config.debounce {
                        tracing::debug!("visibility change debounced");
                        return WatchdogAction::None;
                    }
                }
                self.last_transition = Some(now);
                self.decide(now, hidden_for, status)
            }
        }
    }

    /// Re-check a pending freshness reload after the settle delay.
    #[must_use]
    pub fn still_wants_reload(&self, status: &LoaderStatus) -> bool {
        self.is_visible() && status.ready && !status.loading
    }

    fn decide(&self, now: Instant, hidden_for: Option<Duration>, status: &LoaderStatus) -> WatchdogAction {
        match self.config.policy {
            WatchdogPolicy::HiddenDuration { threshold } => {
                if hidden_for.is_some_and(|hidden| hidden > threshold) {
                    tracing::info!(hidden_ms = ?hidden_for.map(|d| d.as_millis()), "page hidden too long, restarting");
                    WatchdogAction::ForcePageReload
                } else {
                    WatchdogAction::None
                }
            }
            WatchdogPolicy::Freshness { window } => {
                if !status.ready || status.loading {
                    WatchdogAction::None
                } else if is_stale(status.last_loaded, now, window) {
                    WatchdogAction::Reload
                } else {
                    tracing::debug!("data still fresh, no refresh");
                    WatchdogAction::None
                }
            }
            WatchdogPolicy::Liveness { ping_timeout, .. } => {
                if !status.ready || status.loading {
                    WatchdogAction::None
                } else {
                    WatchdogAction::CheckLiveness { ping_timeout }
                }
            }
        }
    }

    /// Freshness window that applies after a successful liveness check.
    #[must_use]
    pub fn freshness_window(&self) -> Option<Duration> {
        match self.config.policy {
            WatchdogPolicy::Freshness { window } | WatchdogPolicy::Liveness { window, .. } => Some(window),
            WatchdogPolicy::HiddenDuration { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "watchdog_test.rs"]
mod tests;

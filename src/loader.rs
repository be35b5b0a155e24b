//! Content loader: fetches inspirations for a scope and joins author profiles.
//!
//! DESIGN
//! ======
//! A load is two queries: the rows, then one batch `user_profiles` read for
//! the distinct owners. Each query races a fixed timeout. The committed list
//! is replaced wholesale on success and left untouched on failure, so a
//! flaky network never blanks the page.
//!
//! Every `load` takes a fresh request id. Only the response to the most
//! recently issued request may commit; anything older is discarded when it
//! finally resolves.
//!
//! TRADE-OFFS
//! ==========
//! The profile join is best effort. A failed profile read still shows the
//! rows (without authors); only a profile timeout fails the whole load.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::{BackendHandle, InspirationQuery};
use crate::error::WallError;
use crate::filter::available_categories;
use crate::model::{Inspiration, UserId, Visibility};
use crate::watchdog::LoaderStatus;

pub const TIMEOUT_MESSAGE: &str = "加载超时，请检查网络连接";
pub const FAILED_MESSAGE: &str = "加载灵感失败";

// =============================================================================
// TYPES
// =============================================================================

/// Which rows a load fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadScope {
    /// Every row owned by the user, private ones included.
    Mine(UserId),
    /// Public rows from everyone, capped at the page size.
    Public,
}

impl LoadScope {
    #[must_use]
    pub fn query(&self, page_size: usize) -> InspirationQuery {
        match self {
            Self::Mine(owner) => InspirationQuery::owned_by(owner.clone()),
            Self::Public => InspirationQuery::public(page_size),
        }
    }
}

/// User-facing load failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("加载超时，请检查网络连接")]
    Timeout,
    /// Carries the underlying cause for logs; the message shown is generic.
    #[error("加载灵感失败")]
    Failed(String),
}

impl LoadError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout => TIMEOUT_MESSAGE,
            Self::Failed(_) => FAILED_MESSAGE,
        }
    }
}

impl From<WallError> for LoadError {
    fn from(err: WallError) -> Self {
        match err {
            WallError::Timeout { .. } => Self::Timeout,
            other => Self::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub total: usize,
    pub public: usize,
    pub private: usize,
}

impl FeedStats {
    #[must_use]
    pub fn of(items: &[Inspiration]) -> Self {
        let public = items.iter().filter(|i| i.visibility == Visibility::Public).count();
        Self { total: items.len(), public, private: items.len() - public }
    }
}

/// Read-only copy of the loader state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub items: Vec<Inspiration>,
    pub loading: bool,
    pub error: Option<LoadError>,
    pub last_loaded: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Committed { count: usize },
    /// A newer load was issued while this one was in flight.
    Discarded,
    Failed(LoadError),
}

/// Undo token returned by `remove_item`.
#[derive(Debug, Clone)]
pub struct Removal {
    previous: Vec<Inspiration>,
    revision: u64,
}

// =============================================================================
// LOADER
// =============================================================================

#[derive(Default)]
struct LoaderInner {
    items: Vec<Inspiration>,
    loading: bool,
    error: Option<LoadError>,
    last_loaded: Option<Instant>,
    latest_request: u64,
    /// Bumped on every change to `items`.
    revision: u64,
}

#[derive(Clone)]
pub struct ContentLoader {
    backend: BackendHandle,
    timeout: Duration,
    page_size: usize,
    inner: Arc<Mutex<LoaderInner>>,
}

impl ContentLoader {
    #[must_use]
    pub fn new(backend: BackendHandle, timeout: Duration, page_size: usize) -> Self {
        Self { backend, timeout, page_size, inner: Arc::new(Mutex::new(LoaderInner::default())) }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `scope` and commit it if no newer load was issued meanwhile.
    pub async fn load(&self, scope: LoadScope) -> LoadOutcome {
        let request_id = {
            let mut inner = self.lock();
            inner.latest_request += 1;
            inner.loading = true;
            inner.latest_request
        };
        tracing::debug!(request_id, ?scope, "load started");

        let result = self.fetch(&scope).await;

        let mut inner = self.lock();
        if request_id != inner.latest_request {
            tracing::debug!(request_id, latest = inner.latest_request, "stale load response discarded");
            return LoadOutcome::Discarded;
        }
        inner.loading = false;
        match result {
            Ok(items) => {
                let count = items.len();
                inner.items = items;
                inner.error = None;
                inner.last_loaded = Some(Instant::now());
                inner.revision += 1;
                tracing::info!(request_id, count, "load committed");
                LoadOutcome::Committed { count }
            }
            Err(e) => {
                tracing::warn!(request_id, error = %e, "load failed, keeping previous list");
                inner.error = Some(e.clone());
                LoadOutcome::Failed(e)
            }
        }
    }

    async fn fetch(&self, scope: &LoadScope) -> Result<Vec<Inspiration>, LoadError> {
        let backend = self.backend.current();
        let query = scope.query(self.page_size);

        let mut items = tokio::time::timeout(self.timeout, backend.list_inspirations(&query))
            .await
            .map_err(|_| LoadError::Timeout)?
            .map_err(LoadError::from)?;
        if items.is_empty() {
            return Ok(items);
        }

        let mut owners: Vec<UserId> = Vec::new();
        for item in &items {
            if !owners.contains(&item.owner_id) {
                owners.push(item.owner_id.clone());
            }
        }

        let profiles = match tokio::time::timeout(self.timeout, backend.fetch_profiles(&owners)).await {
            Err(_) | Ok(Err(WallError::Timeout { .. })) => return Err(LoadError::Timeout),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, owners = owners.len(), "profile lookup failed, showing items without authors");
                return Ok(items);
            }
            Ok(Ok(profiles)) => profiles,
        };

        let by_id: HashMap<&UserId, _> = profiles.iter().map(|p| (&p.id, p)).collect();
        for item in &mut items {
            item.author = by_id.get(&item.owner_id).map(|p| p.author());
        }
        Ok(items)
    }

    // --- optimistic edits ---

    /// Drop one item locally. `None` when the id is not in the list.
    pub fn remove_item(&self, id: &str) -> Option<Removal> {
        let mut inner = self.lock();
        let index = inner.items.iter().position(|item| item.id == id)?;
        let previous = inner.items.clone();
        inner.items.remove(index);
        inner.revision += 1;
        Some(Removal { previous, revision: inner.revision })
    }

    /// Put back the list saved by `remove_item`. Returns `false` (and leaves
    /// the list alone) when something else changed the list in between.
    pub fn restore(&self, removal: Removal) -> bool {
        let mut inner = self.lock();
        if inner.revision != removal.revision {
            tracing::warn!(expected = removal.revision, actual = inner.revision, "list changed, rollback skipped");
            return false;
        }
        inner.items = removal.previous;
        inner.revision += 1;
        true
    }

    /// Forget everything, e.g. after sign-out.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.error = None;
        inner.last_loaded = None;
        inner.revision += 1;
    }

    // --- reads ---

    #[must_use]
    pub fn items(&self) -> Vec<Inspiration> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().items.iter().any(|item| item.id == id)
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        let inner = self.lock();
        FeedSnapshot {
            items: inner.items.clone(),
            loading: inner.loading,
            error: inner.error.clone(),
            last_loaded: inner.last_loaded,
        }
    }

    #[must_use]
    pub fn status(&self, ready: bool) -> LoaderStatus {
        let inner = self.lock();
        LoaderStatus { ready, loading: inner.loading, last_loaded: inner.last_loaded }
    }

    #[must_use]
    pub fn error(&self) -> Option<LoadError> {
        self.lock().error.clone()
    }

    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        available_categories(&self.lock().items)
    }

    #[must_use]
    pub fn stats(&self) -> FeedStats {
        FeedStats::of(&self.lock().items)
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;

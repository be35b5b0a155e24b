//! Page controller: wires the tracker, loader, filter, watchdog, and
//! mutation handlers around one shared backend handle.
//!
//! DESIGN
//! ======
//! `WallApp` plays the role of one open page. `start()` runs the startup
//! sequence (session check, first load). After that, `run()` multiplexes
//! two inputs with `tokio::select!`: auth notifications from the backend
//! and page visibility transitions from the host. Every input is turned
//! into an `AppEffect` the host can render.
//!
//! A "page reload" is a backend `reset()` followed by a fresh `start()`.
//! The run loop resubscribes to auth notifications whenever the backend
//! generation changes.
//!
//! TRADE-OFFS
//! ==========
//! The settle delay before a freshness reload is a deadline polled by the
//! run loop, not a sleep inside the handler, so a quick hide/show during
//! the delay is observed before the reload fires.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use crate::account::Accounts;
use crate::backend::{AuthEvent, BackendHandle};
use crate::card::CardView;
use crate::config::WallConfig;
use crate::error::WallError;
use crate::filter::{CategoryFilter, FilterViewModel};
use crate::loader::{ContentLoader, FeedSnapshot, FeedStats, LoadOutcome, LoadScope};
use crate::model::{Inspiration, UserId};
use crate::mutation::{Created, ImageFailurePrompt, InspirationDraft, Mutations};
use crate::session::{SessionDecision, SessionTracker};
use crate::watchdog::{PageVisibility, VisibilityWatchdog, WatchdogAction, is_stale};

/// Which page is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Public inspirations from everyone.
    PublicWall,
    /// The signed-in user's own inspirations.
    Dashboard,
}

/// What an input did to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEffect {
    None,
    Reloaded(LoadOutcome),
    /// A freshness reload will run once the settle delay passes.
    ReloadScheduled,
    /// The backend was reset and the page started over.
    PageReload,
    /// The dashboard lost its user and switched to the public wall.
    RedirectHome,
}

pub struct WallApp {
    config: WallConfig,
    view: View,
    backend: BackendHandle,
    loader: ContentLoader,
    mutations: Mutations,
    accounts: Accounts,
    tracker: SessionTracker,
    watchdog: VisibilityWatchdog,
    filter: FilterViewModel,
    ready: bool,
    pending_reload: Option<Instant>,
}

impl WallApp {
    #[must_use]
    pub fn new(config: WallConfig, backend: BackendHandle, view: View) -> Self {
        let loader = ContentLoader::new(backend.clone(), config.load_timeout, config.public_page_size);
        let mutations = Mutations::new(backend.clone(), loader.clone(), config.image_bucket.clone(), config.retry);
        let accounts = Accounts::new(backend.clone(), config.retry, config.redirect_to.clone());
        Self {
            tracker: SessionTracker::new(config.spurious_sign_in),
            watchdog: VisibilityWatchdog::new(config.watchdog),
            config,
            view,
            backend,
            loader,
            mutations,
            accounts,
            filter: FilterViewModel::new(),
            ready: false,
            pending_reload: None,
        }
    }

    /// Build the backend named by `config` and open `view`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: WallConfig, view: View) -> Result<Self, WallError> {
        let backend = BackendHandle::from_config(&config)?;
        Ok(Self::new(config, backend, view))
    }

    // =========================================================================
    // STARTUP
    // =========================================================================

    /// Check the session, then run the first load for the open view.
    pub async fn start(&mut self) -> AppEffect {
        self.ready = false;
        self.pending_reload = None;
        self.tracker.begin_check();
        let identity = match self.backend.current().current_user().await {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                tracing::warn!(error = %e, "session check failed, continuing signed out");
                None
            }
        };
        self.tracker.complete_check(identity.clone());

        let redirected = self.view == View::Dashboard && identity.is_none();
        if redirected {
            tracing::info!("dashboard needs a signed-in user, redirecting home");
            self.view = View::PublicWall;
            self.loader.clear();
        }

        let outcome = self.refresh().await;
        self.tracker.mark_initial_load();
        self.ready = true;
        if redirected { AppEffect::RedirectHome } else { AppEffect::Reloaded(outcome) }
    }

    /// Restart from scratch with a freshly built backend client.
    ///
    /// # Errors
    ///
    /// Returns the factory's error; the old client stays in use.
    pub async fn reload_page(&mut self) -> Result<AppEffect, WallError> {
        let generation = self.backend.reset()?;
        tracing::info!(generation, "page reload");
        self.watchdog = VisibilityWatchdog::new(self.config.watchdog);
        self.start().await;
        Ok(AppEffect::PageReload)
    }

    // =========================================================================
    // INPUTS
    // =========================================================================

    /// Fold one auth notification into the page.
    ///
    /// # Errors
    ///
    /// Returns an error only if a forced page reload cannot rebuild the backend.
    pub async fn handle_auth_event(&mut self, event: &AuthEvent) -> Result<AppEffect, WallError> {
        match self.tracker.observe(event) {
            SessionDecision::Ignore => Ok(AppEffect::None),
            SessionDecision::Reload => {
                if self.view == View::Dashboard && self.tracker.identity().is_none() {
                    self.view = View::PublicWall;
                    self.loader.clear();
                    self.refresh().await;
                    return Ok(AppEffect::RedirectHome);
                }
                Ok(AppEffect::Reloaded(self.refresh().await))
            }
            SessionDecision::ForcePageReload => self.reload_page().await,
        }
    }

    /// Fold one visibility transition observed at `now` into the page.
    ///
    /// # Errors
    ///
    /// Returns an error only if a forced page reload cannot rebuild the backend.
    pub async fn handle_visibility(&mut self, visibility: PageVisibility, now: Instant) -> Result<AppEffect, WallError> {
        let status = self.loader.status(self.ready);
        match self.watchdog.on_transition(visibility, now, &status) {
            WatchdogAction::None => Ok(AppEffect::None),
            WatchdogAction::Reload => Ok(self.schedule_reload(now)),
            WatchdogAction::ForcePageReload => self.reload_page().await,
            WatchdogAction::CheckLiveness { ping_timeout } => {
                if let Err(reason) = self.ping(ping_timeout).await {
                    tracing::warn!(%reason, "backend unresponsive after resume, reloading page");
                    return self.reload_page().await;
                }
                let window = self.watchdog.freshness_window().unwrap_or(Duration::ZERO);
                if is_stale(status.last_loaded, now, window) {
                    Ok(self.schedule_reload(now))
                } else {
                    tracing::debug!("backend alive and data fresh");
                    Ok(AppEffect::None)
                }
            }
        }
    }

    async fn ping(&self, timeout: Duration) -> Result<(), String> {
        match tokio::time::timeout(timeout, self.backend.current().ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("ping timed out after {}ms", timeout.as_millis())),
        }
    }

    fn schedule_reload(&mut self, now: Instant) -> AppEffect {
        self.pending_reload = Some(now + self.watchdog.config().settle);
        AppEffect::ReloadScheduled
    }

    /// Deadline of a scheduled freshness reload, if any.
    #[must_use]
    pub fn pending_reload(&self) -> Option<Instant> {
        self.pending_reload
    }

    /// Run the scheduled reload if the page is still visible and idle.
    pub async fn settle_elapsed(&mut self) -> AppEffect {
        if self.pending_reload.take().is_none() {
            return AppEffect::None;
        }
        if !self.watchdog.still_wants_reload(&self.loader.status(self.ready)) {
            tracing::debug!("page hidden or busy after settle, skipping reload");
            return AppEffect::None;
        }
        AppEffect::Reloaded(self.refresh().await)
    }

    // =========================================================================
    // RUN LOOP
    // =========================================================================

    /// Serve auth notifications and visibility transitions until the
    /// visibility channel closes. `on_effect` sees every non-trivial effect.
    ///
    /// # Errors
    ///
    /// Returns an error if a forced page reload cannot rebuild the backend.
    pub async fn run<F>(&mut self, mut visibility: mpsc::Receiver<PageVisibility>, mut on_effect: F) -> Result<(), WallError>
    where
        F: FnMut(&Self, &AppEffect),
    {
        let mut generation = self.backend.generation();
        let mut events = self.backend.current().subscribe();

        loop {
            let deadline = self.pending_reload;
            let settle = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            let effect = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => self.handle_auth_event(&event).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "auth events lagged");
                        AppEffect::None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = self.backend.current().subscribe();
                        AppEffect::None
                    }
                },
                transition = visibility.recv() => match transition {
                    Some(transition) => self.handle_visibility(transition, Instant::now()).await?,
                    None => break,
                },
                () = settle => self.settle_elapsed().await,
            };

            if self.backend.generation() != generation {
                generation = self.backend.generation();
                events = self.backend.current().subscribe();
            }
            if effect != AppEffect::None {
                on_effect(self, &effect);
            }
        }
        tracing::info!("visibility channel closed, run loop done");
        Ok(())
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    fn scope(&self) -> Option<LoadScope> {
        match self.view {
            View::PublicWall => Some(LoadScope::Public),
            View::Dashboard => self.tracker.identity().cloned().map(LoadScope::Mine),
        }
    }

    /// Manual refresh of the open view.
    pub async fn refresh(&mut self) -> LoadOutcome {
        let outcome = match self.scope() {
            Some(scope) => self.loader.load(scope).await,
            None => LoadOutcome::Committed { count: 0 },
        };
        self.filter.set_source(self.loader.items());
        outcome
    }

    pub fn select_category(&mut self, filter: CategoryFilter) {
        self.filter.select(filter);
    }

    #[must_use]
    pub fn visible_items(&self) -> &[Inspiration] {
        self.filter.visible()
    }

    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.filter.categories()
    }

    #[must_use]
    pub fn cards(&self, now: OffsetDateTime) -> Vec<CardView> {
        let viewer = self.tracker.identity();
        self.filter
            .visible()
            .iter()
            .map(|item| CardView::new(item, viewer, now))
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        self.loader.snapshot()
    }

    #[must_use]
    pub fn stats(&self) -> FeedStats {
        self.loader.stats()
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// # Errors
    ///
    /// See `Mutations::create`.
    pub async fn create(
        &mut self,
        draft: &mut InspirationDraft,
        prompt: &(dyn ImageFailurePrompt + Send + Sync),
    ) -> Result<Created, WallError> {
        let created = self.mutations.create(draft, prompt).await?;
        self.filter.set_source(self.loader.items());
        Ok(created)
    }

    /// # Errors
    ///
    /// `NotSignedIn`, or see `Mutations::delete`.
    pub async fn delete(&mut self, id: &str) -> Result<(), WallError> {
        let owner = self.identity().cloned().ok_or(WallError::NotSignedIn)?;
        let result = self.mutations.delete(id, &owner).await;
        self.filter.set_source(self.loader.items());
        result
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn view(&self) -> View {
        self.view
    }

    #[must_use]
    pub fn identity(&self) -> Option<&UserId> {
        self.tracker.identity()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    #[must_use]
    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;

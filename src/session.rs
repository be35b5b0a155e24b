//! Session tracker: decides which auth notifications deserve a reload.
//!
//! DESIGN
//! ======
//! The auth service pushes a `SIGNED_IN` notification every time a
//! backgrounded tab regains focus, even when nobody signed in or out. The
//! tracker remembers the last identity and only asks for a reload when the
//! identity actually changed, the initial load is done, and the event is a
//! real sign-in or sign-out.
//!
//! States: `Unknown → Checking → {Authenticated(id), Anonymous}`. There is
//! no terminal state; the tracker lives as long as the page.
//!
//! TRADE-OFFS
//! ==========
//! A sign-in with an unchanged identity is treated as spurious. Under
//! `ForcePageReload` the tracker assumes the transport went stale and asks
//! for a full restart; this is a heuristic, not a proof.

use crate::backend::{AuthEvent, AuthEventKind};
use crate::model::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Checking,
    Authenticated(UserId),
    Anonymous,
}

/// What to do with a sign-in that did not change the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpuriousSignInPolicy {
    #[default]
    Ignore,
    ForcePageReload,
}

/// The tracker's verdict for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDecision {
    Ignore,
    Reload,
    ForcePageReload,
}

#[derive(Debug, Clone)]
pub struct SessionTracker {
    state: SessionState,
    last_identity: Option<UserId>,
    initial_load_done: bool,
    policy: SpuriousSignInPolicy,
}

impl SessionTracker {
    #[must_use]
    pub fn new(policy: SpuriousSignInPolicy) -> Self {
        Self { state: SessionState::Unknown, last_identity: None, initial_load_done: false, policy }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn identity(&self) -> Option<&UserId> {
        self.last_identity.as_ref()
    }

    #[must_use]
    pub fn initial_load_done(&self) -> bool {
        self.initial_load_done
    }

    /// Start the one-shot "who is signed in" query. Also used on restart.
    pub fn begin_check(&mut self) {
        self.state = SessionState::Checking;
        self.initial_load_done = false;
    }

    /// Record the answer to the startup query.
    pub fn complete_check(&mut self, identity: Option<UserId>) {
        self.state = state_for(identity.as_ref());
        tracing::info!(user = ?identity, "session check complete");
        self.last_identity = identity;
    }

    /// Record that the startup load finished; notifications may now reload.
    pub fn mark_initial_load(&mut self) {
        self.initial_load_done = true;
    }

    /// Fold one pushed notification into the tracker.
    pub fn observe(&mut self, event: &AuthEvent) -> SessionDecision {
        let next = event.user.clone();
        let changed = next != self.last_identity;
        self.state = state_for(next.as_ref());

        let decision = if self.initial_load_done {
            match (&event.kind, changed) {
                (AuthEventKind::SignedIn | AuthEventKind::SignedOut, true) => SessionDecision::Reload,
                (AuthEventKind::SignedIn, false) => match self.policy {
                    SpuriousSignInPolicy::Ignore => SessionDecision::Ignore,
                    SpuriousSignInPolicy::ForcePageReload => SessionDecision::ForcePageReload,
                },
                (AuthEventKind::SignedOut, false)
                | (AuthEventKind::TokenRefreshed | AuthEventKind::InitialSession | AuthEventKind::Other(_), _) => {
                    SessionDecision::Ignore
                }
            }
        } else {
            SessionDecision::Ignore
        };

        if decision == SessionDecision::Ignore {
            tracing::debug!(kind = ?event.kind, changed, "auth event ignored");
        } else {
            tracing::info!(kind = ?event.kind, changed, ?decision, "auth event accepted");
        }

        self.last_identity = next;
        decision
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(SpuriousSignInPolicy::default())
    }
}

fn state_for(identity: Option<&UserId>) -> SessionState {
    match identity {
        Some(id) => SessionState::Authenticated(id.clone()),
        None => SessionState::Anonymous,
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

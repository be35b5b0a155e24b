use super::*;

fn uid(raw: &str) -> UserId {
    UserId::new(raw)
}

fn event(kind: AuthEventKind, user: Option<&str>) -> AuthEvent {
    AuthEvent::new(kind, user.map(UserId::new))
}

fn ready_tracker(identity: Option<&str>, policy: SpuriousSignInPolicy) -> SessionTracker {
    let mut tracker = SessionTracker::new(policy);
    tracker.begin_check();
    tracker.complete_check(identity.map(UserId::new));
    tracker.mark_initial_load();
    tracker
}

// =============================================================
// State transitions
// =============================================================

#[test]
fn starts_unknown_then_checking() {
    let mut tracker = SessionTracker::default();
    assert_eq!(tracker.state(), &SessionState::Unknown);
    tracker.begin_check();
    assert_eq!(tracker.state(), &SessionState::Checking);
}

#[test]
fn check_resolves_to_authenticated_or_anonymous() {
    let mut tracker = SessionTracker::default();
    tracker.begin_check();
    tracker.complete_check(Some(uid("u1")));
    assert_eq!(tracker.state(), &SessionState::Authenticated(uid("u1")));

    tracker.begin_check();
    tracker.complete_check(None);
    assert_eq!(tracker.state(), &SessionState::Anonymous);
    assert!(tracker.identity().is_none());
}

// =============================================================
// Reload decisions
// =============================================================

#[test]
fn real_sign_in_requests_reload() {
    let mut tracker = ready_tracker(None, SpuriousSignInPolicy::Ignore);
    let decision = tracker.observe(&event(AuthEventKind::SignedIn, Some("u1")));
    assert_eq!(decision, SessionDecision::Reload);
    assert_eq!(tracker.state(), &SessionState::Authenticated(uid("u1")));
}

#[test]
fn real_sign_out_requests_reload() {
    let mut tracker = ready_tracker(Some("u1"), SpuriousSignInPolicy::Ignore);
    let decision = tracker.observe(&event(AuthEventKind::SignedOut, None));
    assert_eq!(decision, SessionDecision::Reload);
    assert_eq!(tracker.state(), &SessionState::Anonymous);
}

#[test]
fn events_before_initial_load_never_reload() {
    let mut tracker = SessionTracker::default();
    tracker.begin_check();
    tracker.complete_check(None);
    let decision = tracker.observe(&event(AuthEventKind::SignedIn, Some("u1")));
    assert_eq!(decision, SessionDecision::Ignore);
    // The identity is still tracked so the next duplicate is recognized.
    assert_eq!(tracker.identity(), Some(&uid("u1")));
}

#[test]
fn token_refresh_and_initial_session_are_ignored_even_when_changed() {
    let mut tracker = ready_tracker(None, SpuriousSignInPolicy::Ignore);
    assert_eq!(tracker.observe(&event(AuthEventKind::TokenRefreshed, Some("u1"))), SessionDecision::Ignore);
    assert_eq!(tracker.observe(&event(AuthEventKind::InitialSession, Some("u2"))), SessionDecision::Ignore);
    assert_eq!(
        tracker.observe(&event(AuthEventKind::Other("USER_UPDATED".into()), Some("u3"))),
        SessionDecision::Ignore
    );
}

#[test]
fn duplicate_sign_ins_reload_at_most_once() {
    let mut tracker = ready_tracker(None, SpuriousSignInPolicy::Ignore);
    let reloads = (0..10)
        .map(|_| tracker.observe(&event(AuthEventKind::SignedIn, Some("u1"))))
        .filter(|d| *d == SessionDecision::Reload)
        .count();
    assert_eq!(reloads, 1);
}

#[test]
fn duplicates_of_the_startup_identity_never_reload() {
    let mut tracker = ready_tracker(Some("u1"), SpuriousSignInPolicy::Ignore);
    for kind in [AuthEventKind::SignedIn, AuthEventKind::TokenRefreshed, AuthEventKind::InitialSession] {
        assert_eq!(tracker.observe(&event(kind, Some("u1"))), SessionDecision::Ignore);
    }
}

#[test]
fn spurious_sign_in_forces_page_reload_under_reload_policy() {
    let mut tracker = ready_tracker(Some("u1"), SpuriousSignInPolicy::ForcePageReload);
    let decision = tracker.observe(&event(AuthEventKind::SignedIn, Some("u1")));
    assert_eq!(decision, SessionDecision::ForcePageReload);
}

#[test]
fn switching_accounts_reloads() {
    let mut tracker = ready_tracker(Some("u1"), SpuriousSignInPolicy::ForcePageReload);
    let decision = tracker.observe(&event(AuthEventKind::SignedIn, Some("u2")));
    assert_eq!(decision, SessionDecision::Reload);
}

#[test]
fn begin_check_rearms_initial_load_guard() {
    let mut tracker = ready_tracker(Some("u1"), SpuriousSignInPolicy::Ignore);
    tracker.begin_check();
    assert!(!tracker.initial_load_done());
    assert_eq!(tracker.observe(&event(AuthEventKind::SignedOut, None)), SessionDecision::Ignore);
}

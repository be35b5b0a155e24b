use super::*;
use crate::backend::UserMetadata;
use crate::backend::test_helpers::{MockBackend, mock_handle, sample_user};
use crate::model::UserId;
use std::sync::Arc;
use std::time::Duration;

fn user(email: Option<&str>, username: Option<&str>, full_name: Option<&str>) -> AuthUser {
    AuthUser {
        id: UserId::new("u1"),
        email: email.map(str::to_owned),
        metadata: UserMetadata {
            username: username.map(str::to_owned),
            full_name: full_name.map(str::to_owned),
            avatar_url: None,
        },
    }
}

fn sign_up_form(password: &str, confirm: &str) -> SignUpForm {
    SignUpForm {
        email: "new@example.com".into(),
        username: "newbie".into(),
        password: password.into(),
        confirm_password: confirm.into(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(10), max_delay: Duration::from_millis(20) }
}

// =============================================================
// Forms
// =============================================================

#[test]
fn sign_in_requires_both_fields() {
    let mut form = SignInForm::default();
    assert_eq!(form.validate(), Err(ValidationError::EmptyEmail));
    form.email = "a@b.c".into();
    assert_eq!(form.validate(), Err(ValidationError::EmptyPassword));
    form.password = "x".into();
    assert!(form.validate().is_ok());
}

#[test]
fn sign_up_checks_mismatch_before_length() {
    assert_eq!(sign_up_form("abc", "abd").validate(None), Err(ValidationError::PasswordMismatch));
    assert_eq!(
        sign_up_form("abc", "abc").validate(None),
        Err(ValidationError::PasswordTooShort { min: 6 })
    );
}

#[test]
fn sign_up_builds_request_with_redirect() {
    let request = sign_up_form("secret1", "secret1")
        .validate(Some("http://localhost:3000/auth/callback".into()))
        .unwrap();
    assert_eq!(request.username, "newbie");
    assert_eq!(request.redirect_to.as_deref(), Some("http://localhost:3000/auth/callback"));
}

#[test]
fn sign_up_requires_username() {
    let mut form = sign_up_form("secret1", "secret1");
    form.username = "  ".into();
    assert_eq!(form.validate(None), Err(ValidationError::EmptyUsername));
}

// =============================================================
// Profiles
// =============================================================

#[test]
fn default_profile_prefers_metadata() {
    let profile = default_profile(&user(Some("alice@example.com"), Some("ali"), Some("Alice A")));
    assert_eq!(profile.username.as_deref(), Some("ali"));
    assert_eq!(profile.full_name.as_deref(), Some("Alice A"));
    assert_eq!(profile.avatar_url.as_deref(), Some(""));
}

#[test]
fn default_profile_falls_back_to_email_then_placeholders() {
    let from_email = default_profile(&user(Some("bob@example.com"), None, None));
    assert_eq!(from_email.username.as_deref(), Some("bob"));
    assert_eq!(from_email.full_name.as_deref(), Some("bob@example.com"));

    let bare = default_profile(&user(None, None, None));
    assert_eq!(bare.username.as_deref(), Some("用户"));
    assert_eq!(bare.full_name.as_deref(), Some("匿名用户"));
}

#[test]
fn display_name_chain() {
    assert_eq!(display_name(&user(Some("bob@example.com"), None, Some("Bobby"))), "Bobby");
    assert_eq!(display_name(&user(Some("bob@example.com"), None, None)), "bob");
    assert_eq!(display_name(&user(None, None, None)), "用户");
    assert_eq!(user_initial(&user(Some("bob@example.com"), None, None)), "B");
}

// =============================================================
// Avatars
// =============================================================

#[test]
fn avatar_ref_parses_pixel_and_image() {
    assert_eq!(AvatarRef::parse(Some("pixel:1-2-3-4-5-6")), AvatarRef::Pixel("1-2-3-4-5-6".into()));
    assert_eq!(
        AvatarRef::parse(Some("https://cdn.example.com/a.png")),
        AvatarRef::Image("https://cdn.example.com/a.png".into())
    );
    assert_eq!(AvatarRef::parse(Some("")), AvatarRef::None);
    assert_eq!(AvatarRef::parse(None), AvatarRef::None);
    assert_eq!(AvatarRef::Pixel("0-0-0-0-0-0".into()).to_string(), "pixel:0-0-0-0-0-0");
    assert_eq!(AvatarRef::parse(Some("pixel:9-9")).dna(), Some("9-9"));
}

#[test]
fn random_dna_has_six_digits() {
    let dna = random_dna();
    let genes: Vec<&str> = dna.split('-').collect();
    assert_eq!(genes.len(), 6);
    assert!(genes.iter().all(|g| g.len() == 1 && g.chars().all(|c| c.is_ascii_digit())));
}

// =============================================================
// Service
// =============================================================

#[tokio::test]
async fn invalid_sign_in_never_reaches_backend() {
    let mock = Arc::new(MockBackend::new());
    let accounts = Accounts::new(mock_handle(mock.clone()), fast_retry(), None);
    let err = accounts.sign_in(&SignInForm::default()).await.unwrap_err();
    assert!(matches!(err, WallError::Validation(ValidationError::EmptyEmail)));
    assert!(mock.user.lock().unwrap().is_none());
}

#[tokio::test]
async fn sign_in_and_out_round_trip_events() {
    let mock = Arc::new(MockBackend::new());
    let mut events = mock.events.subscribe();
    let accounts = Accounts::new(mock_handle(mock.clone()), fast_retry(), None);

    let form = SignInForm { email: "alice@example.com".into(), password: "secret".into() };
    let signed_in = accounts.sign_in(&form).await.unwrap();
    assert_eq!(signed_in.id, UserId::new("alice"));
    accounts.sign_out().await.unwrap();

    assert_eq!(events.try_recv().unwrap().kind, crate::backend::AuthEventKind::SignedIn);
    assert_eq!(events.try_recv().unwrap().kind, crate::backend::AuthEventKind::SignedOut);
}

#[tokio::test]
async fn save_pixel_avatar_updates_profile() {
    let mock = Arc::new(MockBackend::new());
    mock.set_user(Some(sample_user("u1")));
    let accounts = Accounts::new(mock_handle(mock.clone()), fast_retry(), None);

    let avatar = accounts.save_pixel_avatar("3-1-4-1-5-9").await.unwrap();
    assert_eq!(avatar, AvatarRef::Pixel("3-1-4-1-5-9".into()));
    assert_eq!(
        *mock.avatars.lock().unwrap(),
        vec![(UserId::new("u1"), "pixel:3-1-4-1-5-9".to_owned())]
    );
}

#[tokio::test]
async fn blank_dna_saves_default() {
    let mock = Arc::new(MockBackend::new());
    mock.set_user(Some(sample_user("u1")));
    let accounts = Accounts::new(mock_handle(mock.clone()), fast_retry(), None);
    let avatar = accounts.save_pixel_avatar("  ").await.unwrap();
    assert_eq!(avatar.dna(), Some(DEFAULT_DNA));
}

#[tokio::test]
async fn save_pixel_avatar_requires_user() {
    let mock = Arc::new(MockBackend::new());
    let accounts = Accounts::new(mock_handle(mock.clone()), fast_retry(), None);
    let err = accounts.save_pixel_avatar("1-1-1-1-1-1").await.unwrap_err();
    assert!(matches!(err, WallError::NotSignedIn));
    assert!(mock.avatars.lock().unwrap().is_empty());
}

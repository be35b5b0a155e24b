//! Backend capability: auth, rows, and object storage behind one trait.
//!
//! DESIGN
//! ======
//! Every component receives a `BackendHandle` instead of reaching for a
//! process-wide client. The handle wraps the current `dyn Backend` plus the
//! factory that built it, so `reset()` swaps in a fresh client and every
//! holder sees the replacement on its next `current()` call.
//!
//! Two implementations exist: `SupabaseBackend` talks HTTP to a hosted
//! backend, `DemoBackend` serves sample rows when credentials are absent.

pub mod demo;
pub mod supabase;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::{BackendMode, WallConfig};
use crate::error::WallError;
use crate::model::{Inspiration, NewInspiration, Profile, UserId, Visibility};

/// Capacity of the auth event channel. Slow subscribers see `Lagged`.
pub const AUTH_EVENT_CAPACITY: usize = 32;

// =============================================================================
// AUTH TYPES
// =============================================================================

/// Free-form metadata attached to an account at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// The signed-in account as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: UserMetadata,
}

/// Kind of a pushed auth notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    InitialSession,
    Other(String),
}

impl AuthEventKind {
    /// Parse the wire name (`SIGNED_IN`, `TOKEN_REFRESHED`, ...).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "SIGNED_IN" => Self::SignedIn,
            "SIGNED_OUT" => Self::SignedOut,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            "INITIAL_SESSION" => Self::InitialSession,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A pushed auth notification: what happened and who is signed in now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub user: Option<UserId>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(kind: AuthEventKind, user: Option<UserId>) -> Self {
        Self { kind, user }
    }
}

/// Account registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub username: String,
    /// Where the confirmation email should send the user back to.
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and a session was issued.
    SignedIn(AuthUser),
    /// The account exists but the email must be confirmed first.
    ConfirmationRequired,
}

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Row filter for `inspirations` reads. Results are always newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspirationQuery {
    pub owner: Option<UserId>,
    pub visibility: Option<Visibility>,
    pub limit: Option<usize>,
}

impl InspirationQuery {
    #[must_use]
    pub fn owned_by(owner: UserId) -> Self {
        Self { owner: Some(owner), visibility: None, limit: None }
    }

    #[must_use]
    pub fn public(limit: usize) -> Self {
        Self { owner: None, visibility: Some(Visibility::Public), limit: Some(limit) }
    }
}

/// An image selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// File extension of the original name, `bin` when there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
            _ => "bin",
        }
    }
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

/// Everything the client asks of the hosted backend. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    // --- auth ---

    /// One-shot "who is signed in" query. `Ok(None)` means anonymous.
    async fn current_user(&self) -> Result<Option<AuthUser>, WallError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, WallError>;

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, WallError>;

    async fn sign_out(&self) -> Result<(), WallError>;

    /// Subscribe to pushed auth notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Cheap round trip used to decide whether the connection is alive.
    async fn ping(&self) -> Result<(), WallError>;

    // --- rows ---

    async fn list_inspirations(&self, query: &InspirationQuery) -> Result<Vec<Inspiration>, WallError>;

    async fn fetch_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, WallError>;

    async fn insert_profile(&self, profile: &Profile) -> Result<(), WallError>;

    async fn update_avatar(&self, owner: &UserId, avatar_url: &str) -> Result<(), WallError>;

    async fn insert_inspiration(&self, record: &NewInspiration) -> Result<(), WallError>;

    /// Delete one row. The owner predicate keeps users off each other's rows.
    async fn delete_inspiration(&self, id: &str, owner: &UserId) -> Result<(), WallError>;

    // --- storage ---

    async fn upload_image(&self, bucket: &str, object: &str, image: &ImageUpload) -> Result<(), WallError>;

    fn public_url(&self, bucket: &str, object: &str) -> String;
}

// =============================================================================
// HANDLE
// =============================================================================

/// Builds a fresh backend client. Called once at startup and on every reset.
pub type BackendFactory = Arc<dyn Fn() -> Result<Arc<dyn Backend>, WallError> + Send + Sync>;

/// Shared, resettable reference to the backend.
#[derive(Clone)]
pub struct BackendHandle {
    current: Arc<RwLock<Arc<dyn Backend>>>,
    factory: BackendFactory,
    generation: Arc<AtomicU64>,
    demo: bool,
}

impl BackendHandle {
    /// Build the first client from `factory`.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if the client cannot be built.
    pub fn new(factory: BackendFactory, demo: bool) -> Result<Self, WallError> {
        let backend = factory()?;
        Ok(Self {
            current: Arc::new(RwLock::new(backend)),
            factory,
            generation: Arc::new(AtomicU64::new(0)),
            demo,
        })
    }

    /// Pick the backend named by the config: HTTP when credentials exist,
    /// sample data otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &WallConfig) -> Result<Self, WallError> {
        match &config.backend {
            BackendMode::Live(credentials) => {
                let credentials = credentials.clone();
                let store = supabase::SessionStore::new(config.session_path.clone());
                let timeouts = config.http_timeouts();
                let factory: BackendFactory = Arc::new(move || {
                    let client = supabase::SupabaseBackend::new(&credentials, store.clone(), timeouts)?;
                    Ok(Arc::new(client) as Arc<dyn Backend>)
                });
                Self::new(factory, false)
            }
            BackendMode::Demo => {
                tracing::warn!("backend credentials not set, running in demo mode");
                let factory: BackendFactory = Arc::new(|| Ok(Arc::new(demo::DemoBackend::new()) as Arc<dyn Backend>));
                Self::new(factory, true)
            }
        }
    }

    /// The client to use for the next call.
    #[must_use]
    pub fn current(&self) -> Arc<dyn Backend> {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Replace the client with a freshly built one. Returns the new generation.
    ///
    /// # Errors
    ///
    /// Returns the factory's error; the previous client stays in place.
    pub fn reset(&self) -> Result<u64, WallError> {
        let fresh = (self.factory)()?;
        *self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = fresh;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(generation, "backend client reset");
        Ok(generation)
    }

    /// Number of resets so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// `true` when running against sample data with writes disabled.
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.demo
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};
    use std::time::Duration;

    use crate::model::AuthorProfile;

    /// Build an inspiration with the fields tests care about.
    #[must_use]
    pub fn sample_item(id: &str, owner: &str, category: &str) -> Inspiration {
        Inspiration {
            id: id.to_owned(),
            owner_id: UserId::new(owner),
            content: format!("content of {id}"),
            description: None,
            tags: vec![],
            category: category.to_owned(),
            visibility: Visibility::Public,
            image_url: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            author: None,
        }
    }

    #[must_use]
    pub fn sample_profile(id: &str, username: &str) -> Profile {
        Profile { id: UserId::new(id), username: Some(username.to_owned()), full_name: None, avatar_url: None }
    }

    #[must_use]
    pub fn sample_user(id: &str) -> AuthUser {
        AuthUser { id: UserId::new(id), email: Some(format!("{id}@example.com")), metadata: UserMetadata::default() }
    }

    /// One scripted answer to `list_inspirations`.
    pub struct ScriptedList {
        pub delay: Duration,
        pub result: Result<Vec<Inspiration>, String>,
    }

    /// Scriptable in-memory backend that records every call.
    pub struct MockBackend {
        pub user: Mutex<Option<AuthUser>>,
        pub rows: Mutex<Vec<Inspiration>>,
        pub profiles: Mutex<Vec<Profile>>,
        pub scripted_lists: Mutex<VecDeque<ScriptedList>>,
        pub profile_delay: Mutex<Duration>,
        pub fail_profiles: AtomicBool,
        pub fail_delete: AtomicBool,
        pub transient_insert_failures: AtomicU32,
        pub upload_error: Mutex<Option<String>>,
        pub ping_ok: AtomicBool,
        pub list_calls: AtomicUsize,
        pub profile_calls: AtomicUsize,
        pub insert_calls: AtomicUsize,
        pub upload_calls: AtomicUsize,
        pub inserted: Mutex<Vec<NewInspiration>>,
        pub inserted_profiles: Mutex<Vec<Profile>>,
        pub deleted: Mutex<Vec<(String, UserId)>>,
        pub avatars: Mutex<Vec<(UserId, String)>>,
        pub events: broadcast::Sender<AuthEvent>,
    }

    impl MockBackend {
        #[must_use]
        pub fn new() -> Self {
            let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
            Self {
                user: Mutex::new(None),
                rows: Mutex::new(Vec::new()),
                profiles: Mutex::new(Vec::new()),
                scripted_lists: Mutex::new(VecDeque::new()),
                profile_delay: Mutex::new(Duration::ZERO),
                fail_profiles: AtomicBool::new(false),
                fail_delete: AtomicBool::new(false),
                transient_insert_failures: AtomicU32::new(0),
                upload_error: Mutex::new(None),
                ping_ok: AtomicBool::new(true),
                list_calls: AtomicUsize::new(0),
                profile_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
                inserted: Mutex::new(Vec::new()),
                inserted_profiles: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                avatars: Mutex::new(Vec::new()),
                events,
            }
        }

        #[must_use]
        pub fn with_rows(rows: Vec<Inspiration>) -> Self {
            let mock = Self::new();
            *mock.rows.lock().unwrap() = rows;
            mock
        }

        pub fn script_list(&self, delay: Duration, result: Result<Vec<Inspiration>, String>) {
            self.scripted_lists
                .lock()
                .unwrap()
                .push_back(ScriptedList { delay, result });
        }

        pub fn set_user(&self, user: Option<AuthUser>) {
            *self.user.lock().unwrap() = user;
        }

        pub fn emit(&self, event: AuthEvent) {
            let _ = self.events.send(event);
        }

        pub fn list_count(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl Backend for MockBackend {
        async fn current_user(&self) -> Result<Option<AuthUser>, WallError> {
            Ok(self.user.lock().unwrap().clone())
        }

        async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthUser, WallError> {
            let user = sample_user(email.split('@').next().unwrap_or(email));
            self.set_user(Some(user.clone()));
            self.emit(AuthEvent::new(AuthEventKind::SignedIn, Some(user.id.clone())));
            Ok(user)
        }

        async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, WallError> {
            let _ = request;
            Ok(SignUpOutcome::ConfirmationRequired)
        }

        async fn sign_out(&self) -> Result<(), WallError> {
            self.set_user(None);
            self.emit(AuthEvent::new(AuthEventKind::SignedOut, None));
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }

        async fn ping(&self) -> Result<(), WallError> {
            if self.ping_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(WallError::Request("connection stale".into()))
            }
        }

        async fn list_inspirations(&self, query: &InspirationQuery) -> Result<Vec<Inspiration>, WallError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.scripted_lists.lock().unwrap().pop_front();
            if let Some(script) = scripted {
                tokio::time::sleep(script.delay).await;
                return script.result.map_err(WallError::Request);
            }
            let rows = self.rows.lock().unwrap().clone();
            let mut selected: Vec<Inspiration> = rows
                .into_iter()
                .filter(|row| query.owner.as_ref().is_none_or(|owner| &row.owner_id == owner))
                .filter(|row| query.visibility.is_none_or(|v| row.visibility == v))
                .collect();
            if let Some(limit) = query.limit {
                selected.truncate(limit);
            }
            Ok(selected)
        }

        async fn fetch_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, WallError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.profile_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
            if self.fail_profiles.load(Ordering::SeqCst) {
                return Err(WallError::Response { status: 500, body: "profiles unavailable".into() });
            }
            Ok(self
                .profiles
                .lock()
                .unwrap()
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect())
        }

        async fn insert_profile(&self, profile: &Profile) -> Result<(), WallError> {
            self.inserted_profiles.lock().unwrap().push(profile.clone());
            self.profiles.lock().unwrap().push(profile.clone());
            Ok(())
        }

        async fn update_avatar(&self, owner: &UserId, avatar_url: &str) -> Result<(), WallError> {
            self.avatars
                .lock()
                .unwrap()
                .push((owner.clone(), avatar_url.to_owned()));
            Ok(())
        }

        async fn insert_inspiration(&self, record: &NewInspiration) -> Result<(), WallError> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.transient_insert_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_insert_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(WallError::Response { status: 503, body: "busy".into() });
            }
            self.inserted.lock().unwrap().push(record.clone());
            let count = self.rows.lock().unwrap().len();
            self.rows.lock().unwrap().insert(
                0,
                Inspiration {
                    id: format!("row-{count}"),
                    owner_id: record.owner_id.clone(),
                    content: record.content.clone(),
                    description: Some(record.description.clone()),
                    tags: record.tags.clone(),
                    category: record.category.clone(),
                    visibility: record.visibility,
                    image_url: record.image_url.clone(),
                    created_at: time::OffsetDateTime::UNIX_EPOCH,
                    author: None::<AuthorProfile>,
                },
            );
            Ok(())
        }

        async fn delete_inspiration(&self, id: &str, owner: &UserId) -> Result<(), WallError> {
            self.deleted
                .lock()
                .unwrap()
                .push((id.to_owned(), owner.clone()));
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(WallError::Response { status: 500, body: "delete failed".into() });
            }
            self.rows
                .lock()
                .unwrap()
                .retain(|row| !(row.id == id && &row.owner_id == owner));
            Ok(())
        }

        async fn upload_image(&self, bucket: &str, _object: &str, _image: &ImageUpload) -> Result<(), WallError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            match self.upload_error.lock().unwrap().clone() {
                Some(message) => Err(WallError::Upload(crate::error::UploadFailure::classify(bucket, &message))),
                None => Ok(()),
            }
        }

        fn public_url(&self, bucket: &str, object: &str) -> String {
            format!("https://mock.local/{bucket}/{object}")
        }
    }

    /// Wrap a mock in a handle whose factory always returns the same mock.
    #[must_use]
    pub fn mock_handle(mock: Arc<MockBackend>) -> BackendHandle {
        let factory: BackendFactory = Arc::new(move || Ok(mock.clone() as Arc<dyn Backend>));
        BackendHandle::new(factory, false).expect("mock factory never fails")
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

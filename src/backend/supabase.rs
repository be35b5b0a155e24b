//! HTTP backend for a hosted Supabase project.
//!
//! DESIGN
//! ======
//! Thin wrapper over the three REST surfaces: GoTrue (`/auth/v1`),
//! PostgREST (`/rest/v1`), and Storage (`/storage/v1`). Every request
//! carries the project `apikey` plus a bearer token: the session's access
//! token when signed in, the anon key otherwise. Query building and
//! response parsing are pure functions for testability.
//!
//! The session lives in a `SessionStore` that outlives any one client, so
//! a `BackendHandle::reset()` keeps the user signed in. Auth notifications
//! are pushed on a per-client broadcast channel; subscribers resubscribe
//! after a reset.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{
    AUTH_EVENT_CAPACITY, AuthEvent, AuthEventKind, AuthUser, Backend, ImageUpload, InspirationQuery, SignUp,
    SignUpOutcome,
};
use crate::config::{BackendCredentials, HttpTimeouts};
use crate::error::{UploadFailure, WallError};
use crate::model::{Inspiration, NewInspiration, Profile, UserId};

const PROFILE_COLUMNS: &str = "id,username,full_name,avatar_url";
const UPLOAD_CACHE_CONTROL: &str = "3600";

// =============================================================================
// SESSION STORE
// =============================================================================

/// Tokens issued by the auth service for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

/// Shared session slot, optionally mirrored to a JSON file.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: Arc<Mutex<Option<StoredSession>>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Open the store, loading a previously saved session from `path`.
    /// An unreadable file is logged and treated as signed out.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        let loaded = path.as_ref().and_then(|p| match std::fs::read_to_string(p) {
            Ok(raw) => match serde_json::from_str::<StoredSession>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "ignoring unreadable session file");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "session file read failed");
                None
            }
        });
        Self { current: Arc::new(Mutex::new(loaded)), path }
    }

    #[must_use]
    pub fn get(&self) -> Option<StoredSession> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session. Persistence failures are logged, not returned.
    pub fn set(&self, session: Option<StoredSession>) {
        if let Some(path) = &self.path {
            let written = match &session {
                Some(s) => serde_json::to_string(s)
                    .map_err(|e| e.to_string())
                    .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string())),
                None => match std::fs::remove_file(path) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.to_string()),
                    _ => Ok(()),
                },
            };
            if let Err(e) = written {
                tracing::warn!(path = %path.display(), error = %e, "session file write failed");
            }
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseBackend {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: SessionStore,
    events: broadcast::Sender<AuthEvent>,
    timeout_secs: u64,
}

impl SupabaseBackend {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the TLS backend cannot be initialized.
    pub fn new(credentials: &BackendCredentials, session: SessionStore, timeouts: HttpTimeouts) -> Result<Self, WallError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| WallError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Ok(Self {
            http,
            base_url: credentials.url.trim_end_matches('/').to_owned(),
            anon_key: credentials.anon_key.clone(),
            session,
            events,
            timeout_secs: timeouts.request.as_secs(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> String {
        let token = self
            .session
            .get()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token);
        format!("Bearer {token}")
    }

    fn emit(&self, kind: AuthEventKind, user: Option<UserId>) {
        tracing::info!(?kind, user = ?user, "auth event");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthEvent::new(kind, user));
    }

    /// Attach credentials, send, and return `(status, body)`.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), WallError> {
        let response = request
            .header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| WallError::from_reqwest(&e, self.timeout_secs))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| WallError::from_reqwest(&e, self.timeout_secs))?;
        Ok((status, body))
    }

    /// Like `send`, but any non-2xx status becomes `WallError::Response`.
    async fn send_ok(&self, request: reqwest::RequestBuilder) -> Result<String, WallError> {
        let (status, body) = self.send(request).await?;
        if (200..300).contains(&status) {
            Ok(body)
        } else {
            Err(WallError::Response { status, body })
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredSession, WallError> {
        let request = self
            .http
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }));
        // Refresh must not present the expired access token.
        let response = request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .send()
            .await
            .map_err(|e| WallError::from_reqwest(&e, self.timeout_secs))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| WallError::from_reqwest(&e, self.timeout_secs))?;
        if !(200..300).contains(&status) {
            return Err(WallError::Response { status, body });
        }
        parse_session(&body)
    }
}

#[async_trait::async_trait]
impl Backend for SupabaseBackend {
    async fn current_user(&self) -> Result<Option<AuthUser>, WallError> {
        let Some(session) = self.session.get() else {
            return Ok(None);
        };

        let (status, body) = self.send(self.http.get(self.url("/auth/v1/user"))).await?;
        match status {
            200..=299 => {
                let user = parse_user(&body)?;
                self.session.set(Some(StoredSession { user: user.clone(), ..session }));
                Ok(Some(user))
            }
            401 | 403 => match self.refresh(&session.refresh_token).await {
                Ok(fresh) => {
                    let user = fresh.user.clone();
                    self.session.set(Some(fresh));
                    self.emit(AuthEventKind::TokenRefreshed, Some(user.id.clone()));
                    Ok(Some(user))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "session refresh failed, signing out");
                    self.session.set(None);
                    self.emit(AuthEventKind::SignedOut, None);
                    Ok(None)
                }
            },
            _ => Err(WallError::Response { status, body }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, WallError> {
        let request = self
            .http
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }));
        let body = self.send_ok(request).await?;
        let session = parse_session(&body)?;
        let user = session.user.clone();
        self.session.set(Some(session));
        self.emit(AuthEventKind::SignedIn, Some(user.id.clone()));
        Ok(user)
    }

    async fn sign_up(&self, request: &SignUp) -> Result<SignUpOutcome, WallError> {
        let mut builder = self.http.post(self.url("/auth/v1/signup")).json(&serde_json::json!({
            "email": request.email,
            "password": request.password,
            "data": { "username": request.username, "full_name": request.username },
        }));
        if let Some(redirect) = &request.redirect_to {
            builder = builder.query(&[("redirect_to", redirect.as_str())]);
        }
        let body = self.send_ok(builder).await?;
        match parse_sign_up(&body)? {
            SignUpResponse::SignedIn(session) => {
                let user = session.user.clone();
                self.session.set(Some(session));
                self.emit(AuthEventKind::SignedIn, Some(user.id.clone()));
                Ok(SignUpOutcome::SignedIn(user))
            }
            SignUpResponse::ConfirmationRequired => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    async fn sign_out(&self) -> Result<(), WallError> {
        if self.session.get().is_some() {
            if let Err(e) = self.send_ok(self.http.post(self.url("/auth/v1/logout"))).await {
                tracing::warn!(error = %e, "remote logout failed, clearing local session anyway");
            }
        }
        self.session.set(None);
        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> Result<(), WallError> {
        self.send_ok(self.http.get(self.url("/auth/v1/health"))).await?;
        Ok(())
    }

    async fn list_inspirations(&self, query: &InspirationQuery) -> Result<Vec<Inspiration>, WallError> {
        let request = self
            .http
            .get(self.url("/rest/v1/inspirations"))
            .query(&list_params(query));
        let body = self.send_ok(request).await?;
        parse_rows(&body)
    }

    async fn fetch_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, WallError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .http
            .get(self.url("/rest/v1/user_profiles"))
            .query(&[("select", PROFILE_COLUMNS.to_owned()), ("id", in_filter(ids))]);
        let body = self.send_ok(request).await?;
        parse_rows(&body)
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), WallError> {
        let request = self
            .http
            .post(self.url("/rest/v1/user_profiles"))
            .header("Prefer", "return=minimal")
            .json(profile);
        self.send_ok(request).await?;
        Ok(())
    }

    async fn update_avatar(&self, owner: &UserId, avatar_url: &str) -> Result<(), WallError> {
        let request = self
            .http
            .patch(self.url("/rest/v1/user_profiles"))
            .query(&[("id", eq_filter(owner.as_str()))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "avatar_url": avatar_url }));
        self.send_ok(request).await?;
        Ok(())
    }

    async fn insert_inspiration(&self, record: &NewInspiration) -> Result<(), WallError> {
        let request = self
            .http
            .post(self.url("/rest/v1/inspirations"))
            .header("Prefer", "return=minimal")
            .json(record);
        self.send_ok(request).await?;
        Ok(())
    }

    async fn delete_inspiration(&self, id: &str, owner: &UserId) -> Result<(), WallError> {
        let request = self
            .http
            .delete(self.url("/rest/v1/inspirations"))
            .query(&[("id", eq_filter(id)), ("user_id", eq_filter(owner.as_str()))]);
        self.send_ok(request).await?;
        Ok(())
    }

    async fn upload_image(&self, bucket: &str, object: &str, image: &ImageUpload) -> Result<(), WallError> {
        let request = self
            .http
            .post(self.url(&format!("/storage/v1/object/{bucket}/{object}")))
            .header("Content-Type", &image.content_type)
            .header("cache-control", format!("max-age={UPLOAD_CACHE_CONTROL}"))
            .header("x-upsert", "false")
            .body(image.bytes.clone());
        let (status, body) = self.send(request).await?;
        if (200..300).contains(&status) {
            return Ok(());
        }
        let message = storage_message(&body);
        tracing::warn!(status, %bucket, %message, "image upload rejected");
        Err(WallError::Upload(UploadFailure::classify(bucket, &message)))
    }

    fn public_url(&self, bucket: &str, object: &str) -> String {
        public_object_url(&self.base_url, bucket, object)
    }
}

// =============================================================================
// QUERY BUILDING
// =============================================================================

fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

/// PostgREST `in` filter over quoted ids: `in.("a","b")`.
fn in_filter(ids: &[UserId]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{}\"", id.as_str())).collect();
    format!("in.({})", quoted.join(","))
}

/// Query string for an `inspirations` read, newest first.
fn list_params(query: &InspirationQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_owned()), ("order", "created_at.desc".to_owned())];
    if let Some(owner) = &query.owner {
        params.push(("user_id", eq_filter(owner.as_str())));
    }
    if let Some(visibility) = query.visibility {
        params.push(("status", eq_filter(visibility.as_str())));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

fn public_object_url(base_url: &str, bucket: &str, object: &str) -> String {
    format!("{base_url}/storage/v1/object/public/{bucket}/{object}")
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    user: AuthUser,
}

fn parse_session(json: &str) -> Result<StoredSession, WallError> {
    let raw: SessionResponse = serde_json::from_str(json).map_err(|e| WallError::Parse(e.to_string()))?;
    Ok(StoredSession { access_token: raw.access_token, refresh_token: raw.refresh_token, user: raw.user })
}

fn parse_user(json: &str) -> Result<AuthUser, WallError> {
    serde_json::from_str(json).map_err(|e| WallError::Parse(e.to_string()))
}

/// Outcome of a sign-up before the session is stored.
enum SignUpResponse {
    SignedIn(StoredSession),
    ConfirmationRequired,
}

/// A sign-up returns a full session when email confirmation is disabled,
/// and a bare user object when a confirmation email was sent.
fn parse_sign_up(json: &str) -> Result<SignUpResponse, WallError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|e| WallError::Parse(e.to_string()))?;
    if value.get("access_token").is_some_and(|t| !t.is_null()) {
        parse_session(json).map(SignUpResponse::SignedIn)
    } else {
        Ok(SignUpResponse::ConfirmationRequired)
    }
}

fn parse_rows<T: serde::de::DeserializeOwned>(json: &str) -> Result<Vec<T>, WallError> {
    serde_json::from_str(json).map_err(|e| WallError::Parse(e.to_string()))
}

/// Human-readable message from a storage error body, falling back to the raw body.
fn storage_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_owned))
        })
        .unwrap_or_else(|| body.to_owned())
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;

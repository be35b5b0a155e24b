//! Accounts: sign-in and sign-up forms, default profiles, pixel avatars.
//!
//! DESIGN
//! ======
//! Form validation is pure and runs before any request. `Accounts` wraps
//! the auth calls on the shared `BackendHandle`; the auth notifications
//! those calls trigger reach the session tracker through the backend's
//! event channel, not through return values.
//!
//! Avatars are stored as a single `avatar_url` column. A `pixel:<dna>`
//! value names a generated pixel avatar; anything else is an image URL.

use std::fmt;

use rand::Rng;

use crate::backend::{AuthUser, BackendHandle, SignUp, SignUpOutcome};
use crate::card::initial_of;
use crate::error::{ValidationError, WallError};
use crate::model::Profile;
use crate::retry::{RetryPolicy, retry_with_backoff};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const PIXEL_PREFIX: &str = "pixel:";
pub const DEFAULT_DNA: &str = "0-1-2-3-4-5";
const DNA_GENES: usize = 6;

const FALLBACK_USERNAME: &str = "用户";
const FALLBACK_FULL_NAME: &str = "匿名用户";

// =============================================================================
// FORMS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    /// # Errors
    ///
    /// `EmptyEmail` or `EmptyPassword`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    /// Validate and build the registration request.
    ///
    /// # Errors
    ///
    /// Empty fields, `PasswordMismatch`, or `PasswordTooShort`.
    pub fn validate(&self, redirect_to: Option<String>) -> Result<SignUp, ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::EmptyEmail);
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
        }
        Ok(SignUp {
            email: self.email.trim().to_owned(),
            password: self.password.clone(),
            username: self.username.trim().to_owned(),
            redirect_to,
        })
    }
}

// =============================================================================
// PROFILES
// =============================================================================

fn email_local_part(user: &AuthUser) -> Option<&str> {
    user.email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|local| !local.is_empty())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// Profile row created for a user that has none yet.
#[must_use]
pub fn default_profile(user: &AuthUser) -> Profile {
    let meta = &user.metadata;
    let username = non_empty(meta.username.as_ref())
        .or_else(|| email_local_part(user))
        .unwrap_or(FALLBACK_USERNAME);
    let full_name = non_empty(meta.full_name.as_ref())
        .or_else(|| non_empty(user.email.as_ref()))
        .unwrap_or(FALLBACK_FULL_NAME);
    Profile {
        id: user.id.clone(),
        username: Some(username.to_owned()),
        full_name: Some(full_name.to_owned()),
        avatar_url: Some(meta.avatar_url.clone().unwrap_or_default()),
    }
}

/// Name shown for the signed-in user in the navigation bar.
#[must_use]
pub fn display_name(user: &AuthUser) -> String {
    let meta = &user.metadata;
    non_empty(meta.username.as_ref())
        .or_else(|| non_empty(meta.full_name.as_ref()))
        .or_else(|| email_local_part(user))
        .unwrap_or(FALLBACK_USERNAME)
        .to_owned()
}

/// One-letter badge for the signed-in user.
#[must_use]
pub fn user_initial(user: &AuthUser) -> String {
    initial_of(&display_name(user))
}

// =============================================================================
// AVATARS
// =============================================================================

/// Parsed `avatar_url` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarRef {
    Pixel(String),
    Image(String),
    None,
}

impl AvatarRef {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim) else {
            return Self::None;
        };
        match value.strip_prefix(PIXEL_PREFIX) {
            Some(dna) => Self::Pixel(dna.to_owned()),
            None if !value.is_empty() => Self::Image(value.to_owned()),
            None => Self::None,
        }
    }

    #[must_use]
    pub fn dna(&self) -> Option<&str> {
        match self {
            Self::Pixel(dna) => Some(dna),
            Self::Image(_) | Self::None => None,
        }
    }
}

impl fmt::Display for AvatarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixel(dna) => write!(f, "{PIXEL_PREFIX}{dna}"),
            Self::Image(url) => f.write_str(url),
            Self::None => Ok(()),
        }
    }
}

/// Six random digits joined by `-`, e.g. `3-0-9-1-4-4`.
#[must_use]
pub fn random_dna() -> String {
    let mut rng = rand::rng();
    (0..DNA_GENES)
        .map(|_| rng.random_range(0..10_u8).to_string())
        .collect::<Vec<_>>()
        .join("-")
}

// =============================================================================
// SERVICE
// =============================================================================

#[derive(Clone)]
pub struct Accounts {
    backend: BackendHandle,
    retry: RetryPolicy,
    redirect_to: Option<String>,
}

impl Accounts {
    #[must_use]
    pub fn new(backend: BackendHandle, retry: RetryPolicy, redirect_to: Option<String>) -> Self {
        Self { backend, retry, redirect_to }
    }

    /// # Errors
    ///
    /// Validation failures (no request made) or the auth service's error.
    pub async fn sign_in(&self, form: &SignInForm) -> Result<AuthUser, WallError> {
        form.validate()?;
        let user = self
            .backend
            .current()
            .sign_in(form.email.trim(), &form.password)
            .await?;
        tracing::info!(user = %user.id, "signed in");
        Ok(user)
    }

    /// # Errors
    ///
    /// Validation failures (no request made) or the auth service's error.
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<SignUpOutcome, WallError> {
        let request = form.validate(self.redirect_to.clone())?;
        let outcome = self.backend.current().sign_up(&request).await?;
        match &outcome {
            SignUpOutcome::SignedIn(user) => tracing::info!(user = %user.id, "registered and signed in"),
            SignUpOutcome::ConfirmationRequired => tracing::info!(email = %request.email, "confirmation email sent"),
        }
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns the auth service's error.
    pub async fn sign_out(&self) -> Result<(), WallError> {
        self.backend.current().sign_out().await
    }

    /// Store `dna` as the signed-in user's avatar. The user lookup retries
    /// transient failures; the update itself is sent once.
    ///
    /// # Errors
    ///
    /// `DemoMode`, `NotSignedIn`, or the final backend error.
    pub async fn save_pixel_avatar(&self, dna: &str) -> Result<AvatarRef, WallError> {
        if self.backend.is_demo() {
            return Err(WallError::DemoMode);
        }
        let dna = match dna.trim() {
            "" => DEFAULT_DNA,
            custom => custom,
        };
        let user = retry_with_backoff(&self.retry, "current_user", |attempt| {
            let backend = self.backend.current();
            async move {
                tracing::debug!(attempt, "fetching user for avatar save");
                backend.current_user().await?.ok_or(WallError::NotSignedIn)
            }
        })
        .await?;

        let avatar = AvatarRef::Pixel(dna.to_owned());
        self.backend
            .current()
            .update_avatar(&user.id, &avatar.to_string())
            .await?;
        tracing::info!(user = %user.id, %avatar, "avatar saved");
        Ok(avatar)
    }
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;

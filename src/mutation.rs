//! Mutation handlers: create and delete inspirations.
//!
//! DESIGN
//! ======
//! Create validates locally before touching the network, then walks a fixed
//! pipeline: ensure the author's profile row exists, upload the optional
//! image, insert the row, reload the owner's list. Upload and insert retry
//! transient failures with capped backoff.
//!
//! Delete is optimistic. The item leaves the local list immediately and is
//! put back exactly if the backend refuses. The pattern lives in
//! `apply_then_confirm` so other optimistic edits can reuse it.
//!
//! TRADE-OFFS
//! ==========
//! Delete is never retried: a retried delete that raced a successful one
//! would surface a spurious error after the row is already gone.

use std::future::Future;

use time::OffsetDateTime;

use crate::account::default_profile;
use crate::backend::{AuthUser, BackendHandle, ImageUpload};
use crate::error::{ValidationError, WallError};
use crate::loader::{ContentLoader, LoadOutcome, LoadScope};
use crate::model::{NewInspiration, UserId, Visibility, parse_tags};
use crate::retry::{RetryPolicy, retry_with_backoff};

// =============================================================================
// OPTIMISTIC HELPER
// =============================================================================

/// Apply a local change, confirm it remotely, and undo it if the remote
/// call fails. `apply` returns the undo token handed to `rollback`.
///
/// # Errors
///
/// Returns the remote call's error after `rollback` has run.
pub async fn apply_then_confirm<U, T, A, R, Fut, B>(apply: A, remote: R, rollback: B) -> Result<T, WallError>
where
    A: FnOnce() -> U,
    R: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, WallError>>,
    B: FnOnce(U),
{
    let undo = apply();
    match remote().await {
        Ok(value) => Ok(value),
        Err(e) => {
            rollback(undo);
            Err(e)
        }
    }
}

// =============================================================================
// DRAFT
// =============================================================================

/// The create form's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspirationDraft {
    pub content: String,
    pub description: String,
    /// Comma-separated, as typed.
    pub tags: String,
    pub category: Option<String>,
    pub visibility: Visibility,
    pub image: Option<ImageUpload>,
}

impl InspirationDraft {
    /// Check the draft without any I/O. Returns the selected category.
    ///
    /// # Errors
    ///
    /// `EmptyContent` for blank content, `MissingCategory` when none is picked.
    pub fn validate(&self) -> Result<&str, ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => Ok(category),
            _ => Err(ValidationError::MissingCategory),
        }
    }

    /// Reset every field, visibility back to private.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn to_record(&self, owner: &UserId, category: &str, image_url: Option<String>) -> NewInspiration {
        NewInspiration {
            owner_id: owner.clone(),
            content: self.content.trim().to_owned(),
            description: self.description.trim().to_owned(),
            tags: parse_tags(&self.tags),
            category: category.to_owned(),
            visibility: self.visibility,
            image_url,
        }
    }
}

/// Storage object name for an image: `<unix_millis>_<owner>.<ext>`.
#[must_use]
pub fn image_object_name(now: OffsetDateTime, owner: &UserId, image: &ImageUpload) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{millis}_{owner}.{}", image.extension())
}

/// Asked whether to save the text when the image could not be stored.
pub trait ImageFailurePrompt {
    fn continue_without_image(&self, error: &WallError) -> bool;
}

impl<F> ImageFailurePrompt for F
where
    F: Fn(&WallError) -> bool,
{
    fn continue_without_image(&self, error: &WallError) -> bool {
        self(error)
    }
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub image_url: Option<String>,
    /// The image was dropped after a failed upload.
    pub image_skipped: bool,
    pub reload: LoadOutcome,
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Clone)]
pub struct Mutations {
    backend: BackendHandle,
    loader: ContentLoader,
    bucket: String,
    retry: RetryPolicy,
}

impl Mutations {
    #[must_use]
    pub fn new(backend: BackendHandle, loader: ContentLoader, bucket: impl Into<String>, retry: RetryPolicy) -> Self {
        Self { backend, loader, bucket: bucket.into(), retry }
    }

    /// Save `draft` for the signed-in user. The draft is cleared on success
    /// and left intact on any failure.
    ///
    /// # Errors
    ///
    /// Validation failures (no request made), `DemoMode`, `NotSignedIn`,
    /// a declined image failure, or the insert's final error.
    pub async fn create(
        &self,
        draft: &mut InspirationDraft,
        prompt: &(dyn ImageFailurePrompt + Send + Sync),
    ) -> Result<Created, WallError> {
        let category = draft.validate()?.to_owned();
        if self.backend.is_demo() {
            return Err(WallError::DemoMode);
        }

        let backend = self.backend.current();
        let user = backend.current_user().await?.ok_or(WallError::NotSignedIn)?;
        self.ensure_profile(&user).await;

        let mut image_skipped = false;
        let image_url = match &draft.image {
            Some(image) => match self.upload(&user.id, image).await {
                Ok(url) => Some(url),
                Err(e) if prompt.continue_without_image(&e) => {
                    tracing::warn!(error = %e, "image upload failed, saving text only");
                    image_skipped = true;
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let record = draft.to_record(&user.id, &category, image_url.clone());
        retry_with_backoff(&self.retry, "insert_inspiration", |_| {
            let backend = self.backend.current();
            let record = record.clone();
            async move { backend.insert_inspiration(&record).await }
        })
        .await?;
        tracing::info!(owner = %user.id, %category, visibility = record.visibility.as_str(), "inspiration created");

        draft.clear();
        let reload = self.loader.load(LoadScope::Mine(user.id.clone())).await;
        Ok(Created { image_url, image_skipped, reload })
    }

    /// Remove `id` locally, then on the backend; restore the list on failure.
    ///
    /// # Errors
    ///
    /// `DemoMode`, `NotFound` when `id` is not in the loaded list (no request
    /// made), or the backend's delete error after rollback.
    pub async fn delete(&self, id: &str, owner: &UserId) -> Result<(), WallError> {
        if self.backend.is_demo() {
            return Err(WallError::DemoMode);
        }
        if !self.loader.contains(id) {
            return Err(WallError::NotFound(id.to_owned()));
        }
        let backend = self.backend.current();
        let mut restored = false;
        let result = apply_then_confirm(
            || self.loader.remove_item(id),
            || backend.delete_inspiration(id, owner),
            |removal| {
                restored = removal.is_some_and(|removal| self.loader.restore(removal));
            },
        )
        .await;
        match &result {
            Ok(()) => tracing::info!(%id, %owner, "inspiration deleted"),
            Err(e) if restored => tracing::warn!(%id, error = %e, "delete failed, list restored"),
            Err(e) => tracing::warn!(%id, error = %e, "delete failed, list changed meanwhile, not restored"),
        }
        result
    }

    /// Create a default profile row when the user has none. Never fatal.
    async fn ensure_profile(&self, user: &AuthUser) {
        let backend = self.backend.current();
        match backend.fetch_profiles(std::slice::from_ref(&user.id)).await {
            Ok(existing) if !existing.is_empty() => {}
            Ok(_) => {
                if let Err(e) = backend.insert_profile(&default_profile(user)).await {
                    tracing::warn!(user = %user.id, error = %e, "profile creation failed");
                }
            }
            Err(e) => tracing::warn!(user = %user.id, error = %e, "profile lookup failed"),
        }
    }

    async fn upload(&self, owner: &UserId, image: &ImageUpload) -> Result<String, WallError> {
        let object = image_object_name(OffsetDateTime::now_utc(), owner, image);
        retry_with_backoff(&self.retry, "upload_image", |_| {
            let backend = self.backend.current();
            let object = object.clone();
            async move { backend.upload_image(&self.bucket, &object, image).await }
        })
        .await?;
        Ok(self.backend.current().public_url(&self.bucket, &object))
    }
}

#[cfg(test)]
#[path = "mutation_test.rs"]
mod tests;

//! Sample-data backend used when no credentials are configured.
//!
//! Reads serve a fixed set of rows stamped with the current time; every
//! write and every auth call fails with `WallError::DemoMode`.

use time::OffsetDateTime;
use tokio::sync::broadcast;

use super::{
    AUTH_EVENT_CAPACITY, AuthEvent, AuthUser, Backend, ImageUpload, InspirationQuery, SignUp, SignUpOutcome,
};
use crate::error::WallError;
use crate::model::{Inspiration, NewInspiration, Profile, UserId, Visibility};

/// Owner of the public sample rows.
pub const DEMO_OWNER: &str = "demo-user";

pub struct DemoBackend {
    events: broadcast::Sender<AuthEvent>,
}

impl DemoBackend {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { events }
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn sample(
    id: &str,
    owner: &UserId,
    content: &str,
    description: &str,
    tags: &[&str],
    category: &str,
    visibility: Visibility,
) -> Inspiration {
    Inspiration {
        id: id.to_owned(),
        owner_id: owner.clone(),
        content: content.to_owned(),
        description: Some(description.to_owned()),
        tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        category: category.to_owned(),
        visibility,
        image_url: None,
        created_at: OffsetDateTime::now_utc(),
        author: None,
    }
}

/// The public wall shown to visitors.
#[must_use]
pub fn public_samples() -> Vec<Inspiration> {
    let owner = UserId::new(DEMO_OWNER);
    vec![
        sample(
            "demo-1",
            &owner,
            "这是一个演示灵感：使用AI来自动生成代码注释，提高开发效率",
            "AI辅助开发工具的想法",
            &["AI", "开发工具", "效率"],
            "技术学习",
            Visibility::Public,
        ),
        sample(
            "demo-2",
            &owner,
            "设计一个极简的任务管理应用，只有三个状态：待办、进行中、完成",
            "简化任务管理的产品思路",
            &["产品设计", "极简", "效率"],
            "项目点子",
            Visibility::Public,
        ),
    ]
}

/// The personal dashboard of `owner`.
#[must_use]
pub fn owned_samples(owner: &UserId) -> Vec<Inspiration> {
    vec![
        sample(
            "demo-user-1",
            owner,
            "我的第一个灵感：开发一个AI驱动的代码审查工具",
            "结合静态分析和机器学习，提供智能代码建议",
            &["AI", "代码审查", "开发工具"],
            "技术学习",
            Visibility::Private,
        ),
        sample(
            "demo-user-2",
            owner,
            "产品想法：极简主义的时间管理应用",
            "只关注最重要的三件事，避免功能过载",
            &["产品设计", "时间管理", "极简"],
            "项目点子",
            Visibility::Public,
        ),
    ]
}

#[async_trait::async_trait]
impl Backend for DemoBackend {
    async fn current_user(&self) -> Result<Option<AuthUser>, WallError> {
        Ok(None)
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthUser, WallError> {
        Err(WallError::DemoMode)
    }

    async fn sign_up(&self, _request: &SignUp) -> Result<SignUpOutcome, WallError> {
        Err(WallError::DemoMode)
    }

    async fn sign_out(&self) -> Result<(), WallError> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn ping(&self) -> Result<(), WallError> {
        Ok(())
    }

    async fn list_inspirations(&self, query: &InspirationQuery) -> Result<Vec<Inspiration>, WallError> {
        let mut rows = match &query.owner {
            Some(owner) => owned_samples(owner),
            None => public_samples(),
        };
        if let Some(visibility) = query.visibility {
            rows.retain(|row| row.visibility == visibility);
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn fetch_profiles(&self, _ids: &[UserId]) -> Result<Vec<Profile>, WallError> {
        Ok(Vec::new())
    }

    async fn insert_profile(&self, _profile: &Profile) -> Result<(), WallError> {
        Err(WallError::DemoMode)
    }

    async fn update_avatar(&self, _owner: &UserId, _avatar_url: &str) -> Result<(), WallError> {
        Err(WallError::DemoMode)
    }

    async fn insert_inspiration(&self, _record: &NewInspiration) -> Result<(), WallError> {
        Err(WallError::DemoMode)
    }

    async fn delete_inspiration(&self, _id: &str, _owner: &UserId) -> Result<(), WallError> {
        Err(WallError::DemoMode)
    }

    async fn upload_image(&self, _bucket: &str, _object: &str, _image: &ImageUpload) -> Result<(), WallError> {
        Err(WallError::DemoMode)
    }

    fn public_url(&self, bucket: &str, object: &str) -> String {
        format!("demo://{bucket}/{object}")
    }
}

#[cfg(test)]
#[path = "demo_test.rs"]
mod tests;

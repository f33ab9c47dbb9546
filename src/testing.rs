use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tempfile::TempDir;
use uuid::Uuid;

use crate::AppState;
use crate::auth::{PasswordHasher, TokenAuthority};
use crate::config::TokenSettings;
use crate::database::{
    MemoryUserStore, MemoryVideoStore, NewUser, PublicUser, StoreError, UserEntity, UserStore,
};
use crate::media::{
    MediaKind, MediaLifecycle, MediaStore, MediaStoreError, RemoteAsset, StagedFile, StagingArea,
};

/// 记录调用的远程媒体存储替身
///
/// 上传按调用次序编号，可让全部上传或第 N 次上传失败；删除可以配置为不被确认。
#[derive(Default)]
pub struct FakeMediaStore {
    fail_uploads: AtomicBool,
    fail_upload_at: AtomicUsize,
    unconfirmed_deletes: AtomicBool,
    attempts: AtomicUsize,
    uploads: AtomicUsize,
    deleted: Mutex<Vec<(String, MediaKind)>>,
}

impl FakeMediaStore {
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// 第 `attempt` 次上传失败（从 1 开始计数）
    pub fn fail_upload_at(&self, attempt: usize) {
        self.fail_upload_at.store(attempt, Ordering::SeqCst);
    }

    pub fn unconfirmed_deletes(&self, unconfirmed: bool) {
        self.unconfirmed_deletes.store(unconfirmed, Ordering::SeqCst);
    }

    /// 成功的上传次数
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<(String, MediaKind)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, path: &Path) -> Result<RemoteAsset, MediaStoreError> {
        assert!(path.exists(), "staged file must exist during upload");
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_uploads.load(Ordering::SeqCst)
            || self.fail_upload_at.load(Ordering::SeqCst) == attempt
        {
            return Err(MediaStoreError::Rejected {
                status: 502,
                body: "bad gateway".into(),
            });
        }

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let (kind, duration) = match ext {
            "mp4" => (MediaKind::Video, Some(42.5)),
            _ => (MediaKind::Image, None),
        };
        let public_id = format!("asset-{n}");

        Ok(RemoteAsset {
            url: format!(
                "https://res.cloudinary.com/test/{}/upload/v1/{public_id}.{ext}",
                kind.as_str()
            ),
            public_id,
            kind,
            duration,
            bytes: Some(4),
        })
    }

    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<bool, MediaStoreError> {
        self.deleted
            .lock()
            .unwrap()
            .push((public_id.to_string(), kind));
        Ok(!self.unconfirmed_deletes.load(Ordering::SeqCst))
    }
}

/// 预检通过后被并发注册抢先的用户存储：`create` 总是返回唯一约束冲突
pub struct RacingUserStore {
    inner: Arc<MemoryUserStore>,
}

#[async_trait]
impl UserStore for RacingUserStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserEntity>, StoreError> {
        self.inner.find_by_username_or_email(username, email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        self.inner.find_profile(id).await
    }

    async fn create(&self, _user: NewUser) -> Result<PublicUser, StoreError> {
        Err(StoreError::Duplicate("users_username_key".into()))
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError> {
        self.inner.set_refresh_token(id, token).await
    }

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<PublicUser>, StoreError> {
        self.inner.set_avatar(id, url).await
    }

    async fn set_cover_image(
        &self,
        id: Uuid,
        url: &str,
    ) -> Result<Option<PublicUser>, StoreError> {
        self.inner.set_cover_image(id, url).await
    }
}

pub struct TestContext {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub media: Arc<FakeMediaStore>,
    pub staging_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let users = Arc::new(MemoryUserStore::new());
        Self::build(users.clone(), users)
    }

    /// 用户创建总是在唯一性预检之后冲突
    pub fn racing_registrations() -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let racing = Arc::new(RacingUserStore {
            inner: users.clone(),
        });
        Self::build(racing, users)
    }

    fn build(store: Arc<dyn UserStore>, users: Arc<MemoryUserStore>) -> Self {
        let staging_dir = tempfile::tempdir().unwrap();
        let media = Arc::new(FakeMediaStore::default());
        let tokens = TokenAuthority::new(&TokenSettings {
            access_secret: "test-access-secret".into(),
            access_ttl: Duration::from_secs(900),
            refresh_secret: "test-refresh-secret".into(),
            refresh_ttl: Duration::from_secs(86_400),
        });

        let state = AppState {
            users: store,
            videos: Arc::new(MemoryVideoStore::new()),
            tokens: Arc::new(tokens),
            hasher: PasswordHasher::new(PasswordHasher::MIN_COST),
            media: Arc::new(MediaLifecycle::new(
                StagingArea::new(staging_dir.path()),
                media.clone(),
            )),
        };

        Self {
            state,
            users,
            media,
            staging_dir,
        }
    }

    pub async fn stage(&self, field: &str, original_name: &str) -> StagedFile {
        let body = stream::iter(vec![Ok::<&[u8], std::io::Error>(b"data")]);
        self.state
            .media
            .staging()
            .stage(field, original_name, body)
            .await
            .unwrap()
    }

    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging_dir.path()).unwrap().count()
    }

    pub async fn seed_user(&self, username: &str, email: &str, password: &str) -> PublicUser {
        self.users
            .create(NewUser {
                username: username.into(),
                email: email.into(),
                full_name: "Seeded User".into(),
                password_hash: self.state.hasher.hash(password).unwrap(),
                avatar: "https://res.cloudinary.com/test/image/upload/v1/seed-avatar.png".into(),
                cover_image: None,
            })
            .await
            .unwrap()
    }
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use mediahub_backend::AppState;
use mediahub_backend::auth::{PasswordHasher, TokenAuthority};
use mediahub_backend::config::{HttpSettings, TokenSettings};
use mediahub_backend::database::{MemoryUserStore, MemoryVideoStore};
use mediahub_backend::media::{
    MediaKind, MediaLifecycle, MediaStore, MediaStoreError, RemoteAsset, StagingArea,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "mediahub-test-boundary";

#[derive(Default)]
pub struct FakeMediaStore {
    pub fail_uploads: AtomicBool,
    uploads: AtomicUsize,
    deleted: Mutex<Vec<(String, MediaKind)>>,
}

impl FakeMediaStore {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<(String, MediaKind)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, path: &Path) -> Result<RemoteAsset, MediaStoreError> {
        assert!(path.exists(), "uploaded file must still be staged");
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(MediaStoreError::Rejected {
                status: 503,
                body: "service unavailable".into(),
            });
        }

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let (kind, duration) = match ext {
            "mp4" => (MediaKind::Video, Some(12.0)),
            _ => (MediaKind::Image, None),
        };
        let public_id = format!("upload-{n}");

        Ok(RemoteAsset {
            url: format!(
                "https://res.cloudinary.com/demo/{}/upload/v17/{public_id}.{ext}",
                kind.as_str()
            ),
            public_id,
            kind,
            duration,
            bytes: None,
        })
    }

    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<bool, MediaStoreError> {
        self.deleted
            .lock()
            .unwrap()
            .push((public_id.to_string(), kind));
        Ok(true)
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserStore>,
    pub media: Arc<FakeMediaStore>,
    pub staging_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    /// `Set-Cookie` 中指定名称的值
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.iter().find_map(|c| {
            let pair = c.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.to_string())
        })
    }
}

impl TestApp {
    pub fn new() -> Self {
        let staging_dir = tempfile::tempdir().unwrap();
        let users = Arc::new(MemoryUserStore::new());
        let media = Arc::new(FakeMediaStore::default());

        let state = AppState {
            users: users.clone(),
            videos: Arc::new(MemoryVideoStore::new()),
            tokens: Arc::new(TokenAuthority::new(&TokenSettings {
                access_secret: "integration-access".into(),
                access_ttl: Duration::from_secs(900),
                refresh_secret: "integration-refresh".into(),
                refresh_ttl: Duration::from_secs(86_400),
            })),
            hasher: PasswordHasher::new(PasswordHasher::MIN_COST),
            media: Arc::new(MediaLifecycle::new(
                StagingArea::new(staging_dir.path().join("temp")),
                media.clone(),
            )),
        };

        Self {
            router: mediahub_backend::routes::create_router(state, &HttpSettings::default()),
            users,
            media,
            staging_dir,
        }
    }

    pub fn staged_files(&self) -> usize {
        match std::fs::read_dir(self.staging_dir.path().join("temp")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            cookies,
            body,
        }
    }

    pub async fn register(&self, username: &str, email: &str) -> TestResponse {
        let form = MultipartBody::new()
            .text("username", username)
            .text("email", email)
            .text("fullName", "Alice A")
            .text("password", "Passw0rd!")
            .file("avatar", "me.png", b"png-bytes");
        self.send(form.request("POST", "/api/v1/users/register", None))
            .await
    }

    pub async fn login(&self, username: &str) -> TestResponse {
        self.send(json_request(
            "POST",
            "/api/v1/users/login",
            serde_json::json!({ "username": username, "password": "Passw0rd!" }),
        ))
        .await
    }

    /// 注册并登录，返回访问令牌
    pub async fn signed_in(&self, username: &str) -> String {
        let email = format!("{username}@example.com");
        assert_eq!(self.register(username, &email).await.status, StatusCode::CREATED);
        let login = self.login(username).await;
        assert_eq!(login.status, StatusCode::OK);
        login.body["data"]["accessToken"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

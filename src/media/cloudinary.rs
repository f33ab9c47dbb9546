use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Body;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio_util::io::ReaderStream;

use crate::config::CloudinarySettings;
use crate::media::store::{MediaKind, MediaStore, MediaStoreError, RemoteAsset};

/// Cloudinary 上传接口响应中用到的字段
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    resource_type: String,
    duration: Option<f64>,
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// 基于 Cloudinary 签名 REST 接口的远程媒体存储
#[derive(Clone)]
pub struct CloudinaryStore {
    client: reqwest::Client,
    settings: CloudinarySettings,
}

impl CloudinaryStore {
    pub fn new(settings: CloudinarySettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn endpoint(&self, resource: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.cloud_name,
            resource,
            action
        )
    }

    fn sign(&self, params: &[(&str, String)]) -> String {
        let payload = format!("{}{}", string_to_sign(params), self.settings.api_secret);
        format!("{:x}", Sha256::digest(payload.as_bytes()))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MediaStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MediaStoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// 签名串：参数按名称排序后以 `k=v&k=v` 拼接，空值不参与签名
fn string_to_sign(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn upload(&self, path: &Path) -> Result<RemoteAsset, MediaStoreError> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.clone())]);

        let form = Form::new()
            .part(
                "file",
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
                    .file_name(file_name),
            )
            .text("api_key", self.settings.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(response).await?.json().await?;

        tracing::info!(
            public_id = %uploaded.public_id,
            resource_type = %uploaded.resource_type,
            size_bytes = uploaded.bytes.unwrap_or_default(),
            "Uploaded media to Cloudinary"
        );

        Ok(RemoteAsset {
            kind: MediaKind::from_resource_type(&uploaded.resource_type),
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
            duration: uploaded.duration,
            bytes: uploaded.bytes,
        })
    }

    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<bool, MediaStoreError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let params = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.settings.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint(kind.as_str(), "destroy"))
            .form(&params)
            .send()
            .await?;
        let destroyed: DestroyResponse = Self::check(response).await?.json().await?;

        tracing::info!(
            public_id = %public_id,
            kind = kind.as_str(),
            result = %destroyed.result,
            "Cloudinary destroy finished"
        );
        Ok(destroyed.result == "ok")
    }
}

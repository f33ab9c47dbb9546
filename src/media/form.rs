use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::AppError;
use crate::media::staging::{StagedFile, StagingArea, StagingError};

/// 同名文件字段的上传结果，在请求边界一次性确定
#[derive(Debug, Default)]
pub enum UploadSlot {
    #[default]
    Empty,
    Single(StagedFile),
    Multiple(Vec<StagedFile>),
}

impl UploadSlot {
    fn push(self, file: StagedFile) -> Self {
        match self {
            UploadSlot::Empty => UploadSlot::Single(file),
            UploadSlot::Single(first) => UploadSlot::Multiple(vec![first, file]),
            UploadSlot::Multiple(mut files) => {
                files.push(file);
                UploadSlot::Multiple(files)
            }
        }
    }

    /// 取第一个文件，其余文件随之丢弃并被清理
    pub fn into_single(self) -> Option<StagedFile> {
        match self {
            UploadSlot::Empty => None,
            UploadSlot::Single(file) => Some(file),
            UploadSlot::Multiple(files) => files.into_iter().next(),
        }
    }
}

/// 解析后的 multipart 表单：文本字段与已暂存的文件字段
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadSlot>,
}

impl UploadForm {
    /// 读取全部字段，文件字段边读边写入暂存目录
    pub async fn from_multipart(
        mut multipart: Multipart,
        staging: &StagingArea,
    ) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(original_name) => {
                    let staged = staging
                        .stage(&name, &original_name, field)
                        .await
                        .map_err(|e| match e {
                            StagingError::Stream(msg) => {
                                AppError::Validation(format!("读取上传文件失败: {}", msg))
                            }
                            other => AppError::Internal(other.to_string()),
                        })?;
                    form.add_file(name, staged);
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn add_file(&mut self, name: String, file: StagedFile) {
        let slot = self.files.remove(&name).unwrap_or_default();
        self.files.insert(name, slot.push(file));
    }

    /// 文本字段，去除首尾空白，空值视为缺失
    pub fn text(&self, name: &str) -> Option<String> {
        crate::utils::non_empty(self.fields.get(name).map(String::as_str))
    }

    /// 原样返回文本字段，只有全空白才视为缺失
    pub fn raw_text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    pub fn take_file(&mut self, name: &str) -> Option<StagedFile> {
        self.files.remove(name).and_then(UploadSlot::into_single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::tempdir;

    async fn staged(staging: &StagingArea, name: &str) -> StagedFile {
        let body = stream::iter(vec![Ok::<&[u8], std::io::Error>(b"data")]);
        staging.stage(name, "f.png", body).await.unwrap()
    }

    #[tokio::test]
    async fn multiple_files_collapse_to_first_and_clean_the_rest() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());

        let mut form = UploadForm::default();
        let first = staged(&staging, "avatar").await;
        let first_path = first.path().to_path_buf();
        form.add_file("avatar".into(), first);
        form.add_file("avatar".into(), staged(&staging, "avatar").await);
        form.add_file("avatar".into(), staged(&staging, "avatar").await);

        let kept = form.take_file("avatar").unwrap();
        assert_eq!(kept.path(), first_path.as_path());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        assert!(form.take_file("avatar").is_none());
        assert!(form.take_file("coverImage").is_none());
    }

    #[test]
    fn blank_text_fields_are_missing() {
        let mut form = UploadForm::default();
        form.fields.insert("title".into(), "  My clip ".into());
        form.fields.insert("description".into(), "   ".into());

        assert_eq!(form.text("title").as_deref(), Some("My clip"));
        assert_eq!(form.text("description"), None);
        assert_eq!(form.text("missing"), None);
        assert_eq!(form.raw_text("title").as_deref(), Some("  My clip "));
        assert_eq!(form.raw_text("description"), None);
    }
}

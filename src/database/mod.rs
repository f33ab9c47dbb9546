// 数据库模块
// 包含数据库实体定义、存储接口及其 Postgres / 内存实现

pub mod memory;
pub mod models;
pub mod repositories;

use thiserror::Error;

pub use memory::{MemoryUserStore, MemoryVideoStore};
pub use models::user::{NewUser, PublicUser, UserEntity};
pub use models::video::{NewVideo, VideoEntity, VideoUpdate};
pub use repositories::{PgUserStore, PgVideoStore, UserStore, VideoStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// 违反唯一约束，携带约束名
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// 插入失败时区分唯一约束冲突与其他后端错误
    pub fn from_insert(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(db_err.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

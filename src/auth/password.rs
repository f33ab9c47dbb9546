use bcrypt::{DEFAULT_COST, hash, verify};

use crate::error::AppError;

/// bcrypt 密码哈希
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// bcrypt 允许的最小 cost，仅适合测试
    pub const MIN_COST: u32 = 4;

    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash(password.as_bytes(), self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// 校验密码；存储的哈希格式损坏时按校验失败处理
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        match verify(password.as_bytes(), digest) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!("Stored password digest could not be verified: {}", e);
                false
            }
        }
    }
}

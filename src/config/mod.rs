use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {name}")]
    Missing {
        name: &'static str,
        #[source]
        source: env::VarError,
    },

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// 令牌签发配置，访问令牌与刷新令牌使用各自独立的密钥
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

/// Cloudinary 媒体托管配置
#[derive(Debug, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub max_upload_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".into(),
            server_port: 8000,
            api_base_uri: "/api/v1".into(),
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub tokens: TokenSettings,
    pub cloudinary: CloudinarySettings,
    pub http: HttpSettings,
    pub rate_limit: RateLimitSettings,
    pub upload_temp_dir: PathBuf,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let tokens = TokenSettings {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            access_ttl: duration_or("ACCESS_TOKEN_EXPIRY", Duration::from_secs(15 * 60))?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            refresh_ttl: duration_or("REFRESH_TOKEN_EXPIRY", Duration::from_secs(10 * 86_400))?,
        };
        if tokens.access_secret == tokens.refresh_secret {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_SECRET",
                reason: "must differ from ACCESS_TOKEN_SECRET".into(),
            });
        }

        let cloudinary = CloudinarySettings {
            cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
            api_base: optional("CLOUDINARY_API_BASE")
                .unwrap_or_else(|| "https://api.cloudinary.com".into()),
        };

        let defaults = HttpSettings::default();
        let http = HttpSettings {
            server_host: optional("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed_or("SERVER_PORT", defaults.server_port)?,
            api_base_uri: optional("API_BASE_URI").unwrap_or(defaults.api_base_uri),
            max_upload_bytes: parsed_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        };

        Ok(Config {
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            tokens,
            cloudinary,
            http,
            rate_limit: RateLimitSettings {
                window: duration_or("RATE_LIMIT_WINDOW", Duration::from_secs(60))?,
                max_requests: parsed_or("RATE_LIMIT_REQUESTS", 100)?,
            },
            upload_temp_dir: optional("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./public/temp")),
            bcrypt_cost: parsed_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|source| ConfigError::Missing { name, source })
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn duration_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match optional(name) {
        Some(raw) => parse_duration(&raw).ok_or_else(|| ConfigError::Invalid {
            name,
            reason: format!("expected a number with an optional s/m/h/d suffix, got {raw:?}"),
        }),
        None => Ok(default),
    }
}

/// 解析 `30s` / `15m` / `1h` / `10d` 形式的时长，无后缀时按秒计算
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let value: u64 = digits.trim().parse().ok()?;
    let secs = match unit {
        's' => value,
        'm' => value.checked_mul(60)?,
        'h' => value.checked_mul(3600)?,
        'd' => value.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use redis::AsyncCommands;

use crate::{config::RateLimitSettings, error::AppError};

/// 基于 Redis 固定窗口计数的按 IP 限流
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, settings: RateLimitSettings) -> Self {
        Self {
            redis: Arc::new(redis),
            settings,
        }
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, AppError> {
        let ip = client_ip(&req);
        let window = self.settings.window.as_secs().max(1);
        let key = format!("rate_limit:{}", ip);

        let mut conn = self
            .redis
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Upstream(format!("redis connection failed: {}", e)))?;

        // 使用 Redis 的 INCR 和 EXPIRE 命令实现计数器
        let count: u64 = conn
            .incr(&key, 1)
            .await
            .map_err(|e| AppError::Upstream(format!("redis INCR failed: {}", e)))?;

        if count == 1 {
            // 窗口内第一次请求时设置过期时间
            let _: () = conn
                .expire(&key, window as i64)
                .await
                .map_err(|e| AppError::Upstream(format!("redis EXPIRE failed: {}", e)))?;
        }

        if count > u64::from(self.settings.max_requests) {
            tracing::warn!(ip = %ip, count, "Rate limit exceeded");
            return Err(AppError::RateLimited(window));
        }

        Ok(next.run(req).await)
    }
}

/// 客户端 IP：`x-real-ip`，其次 `x-forwarded-for` 的第一个地址，最后使用连接地址
pub fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::get("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn prefers_real_ip_then_forwarded_for() {
        let req = request(&[("x-real-ip", "10.0.0.1"), ("x-forwarded-for", "10.0.0.2")]);
        assert_eq!(client_ip(&req), "10.0.0.1");

        let req = request(&[("x-forwarded-for", " 192.168.1.5 , 10.0.0.2")]);
        assert_eq!(client_ip(&req), "192.168.1.5");
    }

    #[test]
    fn falls_back_to_connection_address() {
        let mut req = request(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&req), "127.0.0.1");

        assert_eq!(client_ip(&request(&[])), "unknown");
    }
}

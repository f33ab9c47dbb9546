mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{ACCESS_TOKEN_COOKIE, auth_middleware, authenticate};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimiter, client_ip, rate_limit};

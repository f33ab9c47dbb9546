use std::sync::Arc;

use auth::{PasswordHasher, TokenAuthority};
use database::{UserStore, VideoStore};
use media::MediaLifecycle;

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod media;
pub mod middleware;
pub mod operations;
pub mod routes;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub videos: Arc<dyn VideoStore>,
    pub tokens: Arc<TokenAuthority>,
    pub hasher: PasswordHasher,
    pub media: Arc<MediaLifecycle>,
}

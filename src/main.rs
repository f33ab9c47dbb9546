use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use mediahub_backend::{
    AppState,
    auth::{PasswordHasher, TokenAuthority},
    config::Config,
    database::{
        MemoryUserStore, MemoryVideoStore, PgUserStore, PgVideoStore, UserStore, VideoStore,
    },
    media::{CloudinaryStore, MediaLifecycle, StagingArea},
    middleware::{RateLimiter, log_errors, rate_limit},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置存储，未配置数据库时使用内存存储
    let (users, videos): (Arc<dyn UserStore>, Arc<dyn VideoStore>) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'mediahub_backend';")
                            .await?;
                        Ok(())
                    })
                })
                .connect(database_url)
                .await
                .expect("Failed to connect to Postgres");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");

            (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgVideoStore::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory only");
            (
                Arc::new(MemoryUserStore::new()),
                Arc::new(MemoryVideoStore::new()),
            )
        }
    };

    // 设置媒体存储
    let staging = StagingArea::new(config.upload_temp_dir.clone());
    tokio::fs::create_dir_all(staging.dir())
        .await
        .expect("Failed to create upload temp directory");
    let media = MediaLifecycle::new(
        staging,
        Arc::new(CloudinaryStore::new(config.cloudinary.clone())),
    );

    // 设置应用状态
    let state = AppState {
        users,
        videos,
        tokens: Arc::new(TokenAuthority::new(&config.tokens)),
        hasher: PasswordHasher::new(config.bcrypt_cost),
        media: Arc::new(media),
    };

    let router = routes::create_router(state, &config.http);

    // 设置限流器，未配置 Redis 时不限流
    let router = match &config.redis_url {
        Some(redis_url) => {
            let redis_client =
                redis::Client::open(redis_url.as_str()).expect("Failed to create Redis client");
            let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.rate_limit.clone()));
            router.layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit))
        }
        None => {
            tracing::warn!("REDIS_URL not set, rate limiting disabled");
            router
        }
    };

    // 添加日志中间件
    let router = router.layer(ServiceBuilder::new().layer(axum::middleware::from_fn(log_errors)));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 启动服务器
    let addr = SocketAddr::new(
        config.http.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.http.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

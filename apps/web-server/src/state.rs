//! Application state - shared across all handlers.

use std::sync::Arc;

use yatube_core::Paginator;
use yatube_core::ports::{
    Cache, CommentRepository, FollowRepository, GroupRepository, MediaStorage, PasswordService,
    PostRepository, TokenService, UserRepository,
};
use yatube_infra::{
    Argon2PasswordService, InMemoryCache, InMemoryStore, JwtTokenService, LocalMediaStorage,
};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub cache: Arc<dyn Cache>,
    pub media: Arc<dyn MediaStorage>,
    pub tokens: Arc<dyn TokenService>,
    pub passwords: Arc<dyn PasswordService>,
    pub paginator: Paginator,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Build the state from configuration, falling back to in-memory
    /// implementations for anything that is not configured or unreachable.
    pub async fn new(config: AppConfig) -> Self {
        let mut state = Self::in_memory(config, InMemoryStore::new());

        #[cfg(feature = "postgres")]
        state.connect_database().await;

        #[cfg(feature = "redis")]
        state.connect_redis().await;

        tracing::info!("Application state initialized");
        state
    }

    /// State backed entirely by process memory.
    pub fn in_memory(config: AppConfig, store: InMemoryStore) -> Self {
        let media = LocalMediaStorage::new(&config.media_root, config.media_url.clone());

        Self {
            users: Arc::new(store.clone()),
            groups: Arc::new(store.clone()),
            posts: Arc::new(store.clone()),
            comments: Arc::new(store.clone()),
            follows: Arc::new(store),
            cache: Arc::new(InMemoryCache::new()),
            media: Arc::new(media),
            tokens: Arc::new(JwtTokenService::new(config.jwt.clone())),
            passwords: Arc::new(Argon2PasswordService::new()),
            paginator: Paginator::new(config.posts_per_page),
            config: Arc::new(config),
        }
    }

    #[cfg(feature = "postgres")]
    async fn connect_database(&mut self) {
        use yatube_infra::database::{
            PostgresCommentRepository, PostgresFollowRepository, PostgresGroupRepository,
            PostgresPostRepository, PostgresUserRepository, connect,
        };

        let Some(db_config) = self.config.database.as_ref() else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return;
        };

        match connect(db_config).await {
            Ok(db) => {
                self.users = Arc::new(PostgresUserRepository::new(db.clone()));
                self.groups = Arc::new(PostgresGroupRepository::new(db.clone()));
                self.posts = Arc::new(PostgresPostRepository::new(db.clone()));
                self.comments = Arc::new(PostgresCommentRepository::new(db.clone()));
                self.follows = Arc::new(PostgresFollowRepository::new(db));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to database. Using in-memory fallback.");
            }
        }
    }

    #[cfg(feature = "redis")]
    async fn connect_redis(&mut self) {
        use yatube_infra::{RedisCache, RedisConfig};

        let Some(url) = self.config.redis_url.clone() else {
            return;
        };

        match RedisCache::connect(RedisConfig::new(url)).await {
            Ok(cache) => self.cache = Arc::new(cache),
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Redis. Using in-memory cache.");
            }
        }
    }
}

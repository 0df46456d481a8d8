//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use yatube_infra::JwtConfig;
#[cfg(feature = "postgres")]
use yatube_infra::database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    pub redis_url: Option<String>,
    pub posts_per_page: u64,
    pub index_cache_ttl: Duration,
    pub media_root: PathBuf,
    pub media_url: String,
    /// Where login-required pages send anonymous visitors.
    pub login_url: String,
    pub jwt: JwtConfig,
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            #[cfg(feature = "postgres")]
            database: None,
            redis_url: None,
            posts_per_page: 10,
            index_cache_ttl: Duration::from_secs(20),
            media_root: PathBuf::from("./media"),
            media_url: "/media/".to_string(),
            login_url: "/auth/login/".to_string(),
            jwt: JwtConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        #[cfg(feature = "postgres")]
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: parsed("DB_MAX_CONNECTIONS", 20),
            min_connections: parsed("DB_MIN_CONNECTIONS", 2),
        });

        Self {
            host: string("HOST", &defaults.host),
            port: parsed("PORT", defaults.port),
            #[cfg(feature = "postgres")]
            database,
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            posts_per_page: parsed("POSTS_PER_PAGE", defaults.posts_per_page),
            index_cache_ttl: Duration::from_secs(parsed("INDEX_CACHE_TTL_SECS", 20)),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            media_url: string("MEDIA_URL", &defaults.media_url),
            login_url: string("LOGIN_URL", &defaults.login_url),
            jwt: JwtConfig {
                secret: string("JWT_SECRET", &defaults.jwt.secret),
                expiration_hours: parsed("JWT_EXPIRATION_HOURS", defaults.jwt.expiration_hours),
                issuer: string("JWT_ISSUER", &defaults.jwt.issuer),
            },
        }
    }
}

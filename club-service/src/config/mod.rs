use axum_extra::extract::cookie::SameSite;
use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, get_env, get_env_parsed};
use service_core::error::AppError;
use std::env;

pub const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";

const MIN_SECRET_LEN: usize = 32;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const MAX_STATE_TTL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone)]
pub struct ClubConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub google: GoogleOAuthConfig,
    pub session_cookie: SessionCookieConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub fallback_uri: Option<String>,
    pub database: String,
    pub server_selection_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub frontend_url: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub http_timeout_secs: u64,
    pub state_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SessionCookieConfig {
    pub max_age_secs: i64,
    pub secure: bool,
    pub same_site: SameSite,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub local_path: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub oauth_start_attempts: u32,
    pub oauth_start_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Reverse proxies in front of the service; 0 ignores `X-Forwarded-For`.
    pub trusted_proxy_hops: usize,
}

impl ClubConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = ClubConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("club-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                fallback_uri: env::var("MONGODB_FALLBACK_URI")
                    .ok()
                    .filter(|s| !s.is_empty()),
                database: get_env("MONGODB_DATABASE", Some("club_events"), is_prod)?,
                server_selection_timeout_secs: get_env_parsed(
                    "MONGODB_SERVER_SELECTION_TIMEOUT_SECS",
                    "10",
                    is_prod,
                )?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
                ttl_hours: get_env_parsed("JWT_TTL_HOURS", "24", is_prod)?,
            },
            google: GoogleOAuthConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: Secret::new(get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?),
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
                frontend_url: get_env("FRONTEND_URL", Some("http://localhost:5173"), is_prod)?,
                auth_endpoint: get_env("GOOGLE_AUTH_ENDPOINT", Some(GOOGLE_AUTH_ENDPOINT), false)?,
                token_endpoint: get_env(
                    "GOOGLE_TOKEN_ENDPOINT",
                    Some(GOOGLE_TOKEN_ENDPOINT),
                    false,
                )?,
                userinfo_endpoint: get_env(
                    "GOOGLE_USERINFO_ENDPOINT",
                    Some(GOOGLE_USERINFO_ENDPOINT),
                    false,
                )?,
                jwks_uri: get_env("GOOGLE_JWKS_URI", Some(GOOGLE_JWKS_URI), false)?,
                http_timeout_secs: get_env_parsed("OAUTH_HTTP_TIMEOUT_SECS", "15", false)?,
                state_ttl_minutes: get_env_parsed("OAUTH_STATE_TTL_MINUTES", "10", false)?,
            },
            session_cookie: SessionCookieConfig {
                max_age_secs: get_env_parsed("SESSION_COOKIE_MAX_AGE_SECS", "86400", is_prod)?,
                secure: get_env_parsed("SESSION_COOKIE_SECURE", "false", is_prod)?,
                same_site: parse_same_site(&get_env(
                    "SESSION_COOKIE_SAME_SITE",
                    Some("lax"),
                    is_prod,
                )?)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:5173,http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            storage: StorageConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                max_upload_bytes: get_env_parsed("MAX_UPLOAD_BYTES", "10485760", false)?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env_parsed("RATE_LIMIT_LOGIN_ATTEMPTS", "5", false)?,
                login_window_seconds: get_env_parsed(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    "900",
                    false,
                )?,
                oauth_start_attempts: get_env_parsed(
                    "RATE_LIMIT_OAUTH_START_ATTEMPTS",
                    "30",
                    false,
                )?,
                oauth_start_window_seconds: get_env_parsed(
                    "RATE_LIMIT_OAUTH_START_WINDOW_SECONDS",
                    "900",
                    false,
                )?,
                register_attempts: get_env_parsed("RATE_LIMIT_REGISTER_ATTEMPTS", "3", false)?,
                register_window_seconds: get_env_parsed(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                global_ip_limit: get_env_parsed("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", false)?,
                global_ip_window_seconds: get_env_parsed(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    false,
                )?,
                trusted_proxy_hops: get_env_parsed("TRUSTED_PROXY_HOPS", "0", false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.jwt.ttl_hours) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TTL_HOURS must be between 1 and {}",
                MAX_SESSION_TTL_HOURS
            )));
        }

        if self.jwt.secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }

        if !(1..=MAX_STATE_TTL_MINUTES).contains(&self.google.state_ttl_minutes) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAUTH_STATE_TTL_MINUTES must be between 1 and {}",
                MAX_STATE_TTL_MINUTES
            )));
        }

        if self.google.http_timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAUTH_HTTP_TIMEOUT_SECS must be positive"
            )));
        }

        if self.session_cookie.same_site == SameSite::None && !self.session_cookie.secure {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_COOKIE_SAME_SITE=none requires SESSION_COOKIE_SECURE=true"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.session_cookie.secure {
                tracing::warn!("Session cookies are not marked Secure in production");
            }
        }

        Ok(())
    }

    /// Origins a post-login redirect may point at.
    pub fn redirect_origins(&self) -> impl Iterator<Item = &str> {
        self.security
            .allowed_origins
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.google.frontend_url.as_str()))
    }
}

fn parse_same_site(value: &str) -> Result<SameSite, AppError> {
    match value.to_lowercase().as_str() {
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        "none" => Ok(SameSite::None),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "Invalid SESSION_COOKIE_SAME_SITE: {}",
            other
        ))),
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

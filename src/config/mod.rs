//! Configuration management for the Shacker backend
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).
//! Secrets have no fallback value: a missing `JWT_SECRET` stops the process at startup.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Minimum accepted length of the token signing secret, in bytes
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Credentials for the JSONBin leaderboard mirror
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub bin_id: String,
    pub api_key: String,
}

/// Chain settings for the NFT ownership check
#[derive(Debug, Clone)]
pub struct NftConfig {
    /// JSON-RPC endpoint of an Ethereum-compatible node
    pub rpc_url: String,
    /// ERC-721 contract whose holders get the NFT benefits
    pub contract_address: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Database connection URL. `None` selects the in-memory store (development only).
    pub database_url: Option<String>,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Upper bound on every storage call
    pub store_timeout: Duration,

    /// Rate limit: requests per second per IP
    pub rate_limit_rps: u32,

    /// CORS allowed origins (comma separated)
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// HMAC secret for session tokens
    pub jwt_secret: String,

    /// Session token lifetime in days (default: 7)
    pub session_ttl_days: i64,

    /// bcrypt work factor (default: 10)
    pub bcrypt_cost: u32,

    /// Games per UTC day (default: 10)
    pub daily_game_limit: u32,

    /// Daily limit applied to NFT holders instead of `daily_game_limit`
    pub nft_holder_daily_limit: Option<u32>,

    /// NFT check settings; `None` disables the check (everyone is a non-holder)
    pub nft: Option<NftConfig>,

    /// Timeout for chain RPC and mirror HTTP calls
    pub rpc_timeout: Duration,

    /// Leaderboard mirror; `None` disables mirroring
    pub mirror: Option<MirrorConfig>,

    /// Page the second device opens to complete a link session
    pub link_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if database_url.is_none() && environment.is_production() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let port = lookup("PORT")
            .unwrap_or_else(|| "10000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32);
        let store_timeout = Duration::from_millis(parse_or(&lookup, "STORE_TIMEOUT_MS", 5_000u64));
        let rate_limit_rps = parse_or(&lookup, "RATE_LIMIT_RPS", 20u32);
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS");
        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "JWT_SECRET must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }

        let session_ttl_days = parse_or(&lookup, "SESSION_TTL_DAYS", 7i64);
        let bcrypt_cost = parse_or(&lookup, "BCRYPT_COST", 10u32);
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue(
                "BCRYPT_COST must be between 4 and 31".to_string(),
            ));
        }

        let daily_game_limit = parse_or(&lookup, "DAILY_GAME_LIMIT", 10u32);
        let nft_holder_daily_limit = lookup("NFT_HOLDER_DAILY_LIMIT")
            .map(|v| {
                v.parse::<u32>().map_err(|_| {
                    ConfigError::InvalidValue("NFT_HOLDER_DAILY_LIMIT must be a number".to_string())
                })
            })
            .transpose()?;

        let nft = match (lookup("ETH_RPC_URL"), lookup("NFT_CONTRACT_ADDRESS")) {
            (Some(rpc_url), Some(contract_address)) => Some(NftConfig {
                rpc_url,
                contract_address: contract_address.to_lowercase(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "ETH_RPC_URL and NFT_CONTRACT_ADDRESS must be set together".to_string(),
                ))
            }
        };

        let rpc_timeout = Duration::from_millis(parse_or(&lookup, "RPC_TIMEOUT_MS", 5_000u64));

        let mirror = match (lookup("JSONBIN_BIN_ID"), lookup("JSONBIN_API_KEY")) {
            (Some(bin_id), Some(api_key)) => Some(MirrorConfig { bin_id, api_key }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::MissingEnvVar(
                    "JSONBIN_BIN_ID and JSONBIN_API_KEY must be set together".to_string(),
                ))
            }
        };

        let link_base_url = lookup("LINK_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}/link.html", port));

        Ok(Config {
            environment,
            port,
            database_url,
            db_max_connections,
            store_timeout,
            rate_limit_rps,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            session_ttl_days,
            bcrypt_cost,
            daily_game_limit,
            nft_holder_daily_limit,
            nft,
            rpc_timeout,
            mirror,
            link_base_url,
        })
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> String {
        let Some(url) = &self.database_url else {
            return "<in-memory>".to_string();
        };
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                let prefix = &url[..colon_pos + 1];
                let suffix = &url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        url.clone()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

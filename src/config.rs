// ABOUTME: Configuration management for the Instagram scraping client
// ABOUTME: Owns credentials, endpoints and pacing; loads from environment variables or .env

use dotenv::dotenv;
use log::{debug, warn};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:86.0) Gecko/20100101 Firefox/86.0";
pub const DEFAULT_POSTS_QUERY_HASH: &str = "f2405b236d85e8296cf30347c9f08c2a";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid request delay: minimum {min:?} exceeds maximum {max:?}")]
    InvalidDelay { min: Duration, max: Duration },
}

/// Inclusive range a randomized pause between paced requests is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidDelay { min, max });
        }
        Ok(Self { min, max })
    }

    /// No pause at all. Intended for tests against local servers.
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for DelayRange {
    /// 4.20 to 7.20 seconds
    fn default() -> Self {
        Self {
            min: Duration::from_millis(4200),
            max: Duration::from_millis(7200),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Site root without a trailing slash
    pub base_url: String,
    pub user_agent: String,
    pub posts_query_hash: String,
    pub request_delay: DelayRange,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("posts_query_hash", &self.posts_query_hash)
            .field("request_delay", &self.request_delay)
            .finish()
    }
}

impl Config {
    /// Build a configuration with the stock endpoints and pacing
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            posts_query_hash: DEFAULT_POSTS_QUERY_HASH.to_string(),
            request_delay: DelayRange::default(),
        }
    }

    /// Replace the site root, dropping any trailing slash
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_delay(mut self, request_delay: DelayRange) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Load configuration from environment variables
    ///
    /// If environment variables are not set, attempts to load from .env file
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_env_with_dotenv(true).map_err(AppError::Config)
    }

    /// Load configuration from environment variables with option to skip dotenv
    ///
    /// This is useful for testing where we don't want to load from .env
    pub fn from_env_with_dotenv(use_dotenv: bool) -> Result<Self, ConfigError> {
        let dotenv_disabled = env::var("DOTENV_DISABLED").is_ok();

        if use_dotenv && !dotenv_disabled {
            match dotenv() {
                Ok(_) => debug!("Loaded configuration from .env file"),
                Err(_) => warn!("No .env file found, using environment variables only"),
            }
        } else if dotenv_disabled {
            debug!("Dotenv loading disabled by DOTENV_DISABLED environment variable");
        }

        let username = required("IG_USERNAME")?;
        let password = required("IG_PASSWORD")?;

        let mut config = Config::new(username, password);

        if let Ok(base_url) = env::var("IG_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(user_agent) = env::var("IG_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Ok(query_hash) = env::var("IG_POSTS_QUERY_HASH") {
            config.posts_query_hash = query_hash;
        }

        debug!("Configuration loaded for user {}", config.username);
        Ok(config)
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnv(name.to_string()))
}

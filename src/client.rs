// ABOUTME: High-level client that ties login, profile walking and downloads together
// ABOUTME: Entry point for library users who just want a profile's media

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::AppError;
use crate::session::AuthSession;
use crate::timeline::{Posts, TimelineWalker};

/// Scraping client for one account
#[derive(Debug)]
pub struct Client {
    session: AuthSession,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: Config) -> Result<Self, AppError> {
        info!("Client initialized with base URL: {}", config.base_url);
        Ok(Client {
            session: AuthSession::new(config)?,
        })
    }

    /// Create a new client that talks to `base_url` instead of the configured site
    pub fn new_with_base_url<S: Into<String>>(config: Config, base_url: S) -> Result<Self, AppError> {
        Self::new(config.with_base_url(base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.session.config().base_url
    }

    /// Authenticate and fail unless the server accepted the credentials
    pub fn login(&mut self) -> Result<(), AppError> {
        self.session.authenticate()?;
        self.session.ensure_authenticated()
    }

    pub fn is_authenticated(&self) -> Result<bool, AppError> {
        self.session.is_authenticated()
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Every media item of `profile`, fetched lazily from its first page
    pub fn profile_posts(&self, profile: &str) -> Result<Posts<'_>, AppError> {
        let mut walker = TimelineWalker::new(&self.session)?;
        walker.load_profile(profile)?;
        Ok(walker.posts())
    }

    /// Download every media item of `profile` into `output_dir`.
    ///
    /// Stops at the first failure; files written before it stay on disk.
    pub fn download_profile_posts(
        &self,
        profile: &str,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, AppError> {
        let mut paths = Vec::new();

        for record in self.profile_posts(profile)? {
            let record = record?;
            debug!("Downloading {} ({})", record.id(), record.filename());
            paths.push(record.download(output_dir)?);
        }

        info!(
            "Downloaded {} media items from {} to {}",
            paths.len(),
            profile,
            output_dir.display()
        );
        Ok(paths)
    }
}

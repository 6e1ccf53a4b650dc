// ABOUTME: Authenticated HTTP session for the site
// ABOUTME: Performs the CSRF login handshake and keeps cookies for every later request

use chrono::Utc;
use log::{debug, info, warn};
use reqwest::blocking::{Client as HttpClient, ClientBuilder};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::extract::{extract, ScriptMarker};
use crate::pages::{self, AuthResult};

/// Owns the cookie-carrying HTTP client and the login result
#[derive(Debug)]
pub struct AuthSession {
    http_client: HttpClient,
    config: Config,
    auth_result: Option<AuthResult>,
}

impl AuthSession {
    /// Create an unauthenticated session with the configured user agent
    pub fn new(config: Config) -> Result<Self, AppError> {
        let cookie_jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| AppError::Generic(format!("Invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, user_agent);

        let http_client = ClientBuilder::new()
            .cookie_provider(Arc::clone(&cookie_jar))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Generic(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created session for {}", config.base_url);

        Ok(Self {
            http_client,
            config,
            auth_result: None,
        })
    }

    /// Log in with the configured credentials.
    ///
    /// Stores whatever the server answered; a refused login is not an error
    /// here, callers check [`AuthSession::is_authenticated`] afterwards.
    pub fn authenticate(&mut self) -> Result<(), AppError> {
        let login_url = format!("{}/accounts/login/", self.config.base_url);

        info!("Fetching login page {}", login_url);
        let html = self
            .http_client
            .get(&login_url)
            .header(REFERER, &login_url)
            .send()?
            .error_for_status()?
            .text()?;

        let data = extract(&html, &ScriptMarker::shared_data()?)?;
        let csrf_token = pages::csrf_token(&data)?;
        debug!("Found CSRF token on login page");

        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{}",
            Utc::now().timestamp(),
            self.config.password
        );
        let form = [
            ("username", self.config.username.as_str()),
            ("enc_password", enc_password.as_str()),
        ];

        info!("Submitting credentials for {}", self.config.username);
        let body = self
            .http_client
            .post(format!("{}ajax/", login_url))
            .header(REFERER, &login_url)
            .header("X-CSRFToken", csrf_token)
            .form(&form)
            .send()?
            .text()?;

        let result = pages::auth_result(&body)?;
        if result.authenticated {
            info!("Authenticated as {}", self.config.username);
        } else {
            warn!("Server refused login for {}", self.config.username);
        }
        self.auth_result = Some(result);

        Ok(())
    }

    /// Whether the stored login result says the session is authenticated
    pub fn is_authenticated(&self) -> Result<bool, AppError> {
        self.auth_result
            .as_ref()
            .map(|result| result.authenticated)
            .ok_or(AppError::NotYetAuthenticated)
    }

    /// The decoded login response, once `authenticate` has run
    pub fn auth_result(&self) -> Option<&AuthResult> {
        self.auth_result.as_ref()
    }

    /// Shared HTTP client; clones share the cookie jar
    pub fn http(&self) -> &HttpClient {
        &self.http_client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fails unless a login has happened and succeeded
    pub(crate) fn ensure_authenticated(&self) -> Result<(), AppError> {
        if self.is_authenticated()? {
            Ok(())
        } else {
            Err(AppError::Authentication(format!(
                "server did not authenticate {}",
                self.config.username
            )))
        }
    }
}

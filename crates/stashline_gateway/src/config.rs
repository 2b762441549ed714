// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{GatewayError, Result};

/// The JSONPlaceholder endpoint used unless configured otherwise.
pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// The per-request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for an [`HttpGateway`](crate::HttpGateway).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stashline_gateway::GatewayConfig;
///
/// let config = GatewayConfig::default()
///     .with_base_url("http://localhost:3000/")
///     .with_timeout(Duration::from_secs(2));
///
/// assert_eq!(config.base_url, "http://localhost:3000/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct GatewayConfig {
    /// Scheme, host and optional path prefix that resource paths are appended to.
    pub base_url: String,
    /// Upper bound for a whole round trip, from connecting to reading the body.
    pub timeout: Duration,
    /// Value of the `User-Agent` header, if any.
    pub user_agent: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: Some(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

impl GatewayConfig {
    /// Replaces the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the `User-Agent` header. `None` sends no header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Checks the settings and returns the base URL without a trailing slash.
    pub(crate) fn validated_base_url(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|error| GatewayError::Config(format!("base URL {:?}: {error}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(format!("base URL {:?} is not http(s)", self.base_url)));
        }
        if self.timeout.is_zero() {
            return Err(GatewayError::Config("timeout must be greater than zero".to_string()));
        }

        Ok(self.base_url.trim_end_matches('/').to_string())
    }
}

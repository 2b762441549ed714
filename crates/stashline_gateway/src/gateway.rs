// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::{GatewayConfig, GatewayError, Resource, Result};

/// Performs the network retrieval of a [`Resource`].
///
/// A gateway makes exactly one round trip per call. It neither caches nor deduplicates;
/// that is the job of the caches layered on top of it.
pub trait FetchGateway: Send + Sync {
    /// Retrieves `resource` and decodes its JSON body as `T`.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::Status`] for a non-2xx answer, [`GatewayError::Transport`]
    /// if the round trip failed, and [`GatewayError::Decode`] if the body is not a `T`.
    fn fetch<T>(&self, resource: &Resource) -> impl Future<Output = Result<T>> + Send
    where
        T: DeserializeOwned + Send + 'static;
}

/// A [`FetchGateway`] over HTTP.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Examples
///
/// ```no_run
/// use stashline_gateway::{FetchGateway, GatewayConfig, HttpGateway, Resource, User};
///
/// # async fn example() -> stashline_gateway::Result<()> {
/// let gateway = HttpGateway::new(&GatewayConfig::default())?;
/// let user: User = gateway.fetch(&Resource::User(1)).await?;
/// println!("{}", user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl HttpGateway {
    /// Creates a gateway from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the base URL is not an http(s) URL or the timeout
    /// is zero, and [`GatewayError::Transport`] if the HTTP client cannot be initialized.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let base_url = config.validated_base_url()?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Returns the absolute URL for `resource`.
    #[must_use]
    pub fn url(&self, resource: &Resource) -> String {
        format!("{}{}", self.base_url, resource.path())
    }
}

impl FetchGateway for HttpGateway {
    async fn fetch<T>(&self, resource: &Resource) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(resource);
        tracing::debug!(gateway.url = %url, "gateway.request");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(gateway.url = %url, gateway.status = status.as_u16(), "gateway.rejected");
            return Err(GatewayError::Status { status, url });
        }

        let body = response.bytes().await?;
        tracing::debug!(gateway.url = %url, gateway.bytes = body.len(), "gateway.response");

        Ok(serde_json::from_slice(&body)?)
    }
}

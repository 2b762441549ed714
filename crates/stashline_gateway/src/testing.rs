// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test utilities for code that retrieves through a [`FetchGateway`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{FetchGateway, GatewayError, Resource, Result};

/// The base URL that [`MockGateway`] reports in its errors.
const MOCK_BASE_URL: &str = "mock://jsonplaceholder";

/// A [`FetchGateway`] that answers from canned JSON and counts its calls.
///
/// Resources without a canned answer fail with `404 Not Found`. Cloning is cheap and clones
/// share responses and counters.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stashline_gateway::testing::MockGateway;
/// use stashline_gateway::{JsonPlaceholder, Resource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gateway = MockGateway::new().with_response(
///     Resource::User(1),
///     json!({"id": 1, "name": "Leanne Graham", "username": "Bret", "email": "Sincere@april.biz"}),
/// );
/// let api = JsonPlaceholder::new(gateway.clone());
///
/// assert_eq!(api.user(1).await.unwrap().username, "Bret");
/// assert_eq!(gateway.calls(&Resource::User(1)), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<Resource, serde_json::Value>,
    failures: HashMap<Resource, StatusCode>,
    calls: HashMap<Resource, usize>,
    latency: Duration,
}

impl MockGateway {
    /// Creates a gateway with no canned answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `resource` with `body`.
    #[must_use]
    pub fn with_response(self, resource: Resource, body: serde_json::Value) -> Self {
        self.respond(resource, body);
        self
    }

    /// Delays every answer by `latency`, which requires a Tokio runtime with time enabled.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Answers `resource` with `body` from now on.
    pub fn respond(&self, resource: Resource, body: serde_json::Value) {
        let mut state = self.state.lock();
        state.failures.remove(&resource);
        state.responses.insert(resource, body);
    }

    /// Fails `resource` with `status` from now on.
    pub fn fail_with(&self, resource: Resource, status: StatusCode) {
        self.state.lock().failures.insert(resource, status);
    }

    /// Returns how often `resource` was fetched.
    #[must_use]
    pub fn calls(&self, resource: &Resource) -> usize {
        self.state.lock().calls.get(resource).copied().unwrap_or_default()
    }

    /// Returns how often any resource was fetched.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    fn answer(&self, resource: &Resource) -> (Duration, std::result::Result<serde_json::Value, StatusCode>) {
        let mut state = self.state.lock();
        *state.calls.entry(*resource).or_default() += 1;

        let answer = match (state.failures.get(resource), state.responses.get(resource)) {
            (Some(status), _) => Err(*status),
            (None, Some(body)) => Ok(body.clone()),
            (None, None) => Err(StatusCode::NOT_FOUND),
        };
        (state.latency, answer)
    }
}

impl FetchGateway for MockGateway {
    async fn fetch<T>(&self, resource: &Resource) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (latency, answer) = self.answer(resource);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match answer {
            Ok(body) => Ok(serde_json::from_value(body)?),
            Err(status) => Err(GatewayError::Status {
                status,
                url: format!("{MOCK_BASE_URL}{}", resource.path()),
            }),
        }
    }
}

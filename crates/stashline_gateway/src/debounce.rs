// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{FetchGateway, JsonPlaceholder, Result};

/// How long [`DebouncedSearch`] waits for a query to stop changing.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Searches post titles only once the query has stopped changing.
///
/// Every call to [`search`](Self::search) waits out the quiet period first. If another
/// search started in the meantime, the older call returns `Ok(None)` without a round trip,
/// so a burst of keystrokes costs a single request for the last query.
///
/// # Examples
///
/// ```no_run
/// use stashline_gateway::{DebouncedSearch, GatewayConfig, HttpGateway, JsonPlaceholder};
///
/// # async fn example() -> stashline_gateway::Result<()> {
/// let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
/// let search = DebouncedSearch::new(api);
///
/// if let Some(lines) = search.search("qui").await? {
///     println!("{}", lines.join("\n"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DebouncedSearch<G> {
    api: JsonPlaceholder<G>,
    quiet_period: Duration,
    latest: AtomicU64,
}

impl<G> DebouncedSearch<G>
where
    G: FetchGateway,
{
    /// Wraps `api` with the default quiet period of 300 ms.
    #[must_use]
    pub fn new(api: JsonPlaceholder<G>) -> Self {
        Self::with_quiet_period(api, DEFAULT_QUIET_PERIOD)
    }

    /// Wraps `api`, waiting `quiet_period` before each search.
    #[must_use]
    pub fn with_quiet_period(api: JsonPlaceholder<G>, quiet_period: Duration) -> Self {
        Self {
            api,
            quiet_period,
            latest: AtomicU64::new(0),
        }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub fn api(&self) -> &JsonPlaceholder<G> {
        &self.api
    }

    /// Searches for `query` once the quiet period passed without a newer search.
    ///
    /// Returns `Ok(None)` if a newer search superseded this one. A blank query yields no
    /// lines and no round trip.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error.
    pub async fn search(&self, query: &str) -> Result<Option<Vec<String>>> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.quiet_period).await;

        if self.latest.load(Ordering::SeqCst) != ticket {
            tracing::debug!(query, "search superseded by a newer query");
            return Ok(None);
        }
        if query.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }

        self.api.search(query).await.map(Some)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Typed retrieval of [JSONPlaceholder](https://jsonplaceholder.typicode.com) resources.
//!
//! - [`FetchGateway`] is the seam between caches and the network: one call, one round trip.
//! - [`HttpGateway`] implements it over HTTP, configured by [`GatewayConfig`].
//! - [`Resource`] names what can be retrieved and the cache key it is stored under.
//! - [`JsonPlaceholder`] wraps a gateway with typed methods for users, posts, comments and
//!   a title search; [`DebouncedSearch`] only searches once the query stopped changing.
//!
//! With the `test-util` feature, [`testing::MockGateway`] answers from canned JSON and
//! counts its calls.
//!
//! # Example
//!
//! ```no_run
//! use stashline_gateway::{GatewayConfig, HttpGateway, JsonPlaceholder};
//!
//! # async fn example() -> stashline_gateway::Result<()> {
//! let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
//!
//! for line in api.search("qui").await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod config;
mod debounce;
mod error;
mod gateway;
mod resource;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

pub use api::{Comment, JsonPlaceholder, Post, SEARCH_LIMIT, User};
pub use config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, GatewayConfig};
pub use debounce::{DEFAULT_QUIET_PERIOD, DebouncedSearch};
pub use error::{GatewayError, Result};
pub use gateway::{FetchGateway, HttpGateway};
pub use resource::Resource;

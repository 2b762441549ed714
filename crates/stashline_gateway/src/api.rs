// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::{FetchGateway, Resource, Result};

/// How many lines [`JsonPlaceholder::search`] returns at most.
pub const SEARCH_LIMIT: usize = 3;

/// A JSONPlaceholder user. Fields the API sends beyond these are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    /// The user's id.
    pub id: u32,
    /// Full name.
    pub name: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Phone number, free-form.
    #[serde(default)]
    pub phone: String,
    /// Personal website.
    #[serde(default)]
    pub website: String,
}

impl User {
    /// Creates a user with the given identity and no contact details.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            username: username.into(),
            email: email.into(),
            phone: String::new(),
            website: String::new(),
        }
    }
}

/// A JSONPlaceholder post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Post {
    /// The author's id.
    pub user_id: u32,
    /// The post's id.
    pub id: u32,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Post {
    /// Creates a post.
    #[must_use]
    pub fn new(user_id: u32, id: u32, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id,
            id,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A JSONPlaceholder comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Comment {
    /// The post the comment belongs to.
    pub post_id: u32,
    /// The comment's id.
    pub id: u32,
    /// Subject line.
    pub name: String,
    /// The commenter's email address.
    pub email: String,
    /// Body text.
    pub body: String,
}

impl Comment {
    /// Creates a comment.
    #[must_use]
    pub fn new(post_id: u32, id: u32, name: impl Into<String>, email: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            post_id,
            id,
            name: name.into(),
            email: email.into(),
            body: body.into(),
        }
    }
}

/// Typed access to the JSONPlaceholder API through a [`FetchGateway`].
///
/// Every method performs one round trip. Wrap calls in a cache to avoid repeating them;
/// since the client is cheap to clone, a clone can be moved into each producer:
///
/// ```no_run
/// use std::time::Duration;
///
/// use stashline::TtlCache;
/// use stashline_gateway::{GatewayConfig, HttpGateway, JsonPlaceholder, Resource};
/// use timekeep::Clock;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
/// let cache = TtlCache::new(Clock::new_system());
///
/// let resource = Resource::User(1);
/// let user = cache
///     .get(resource.cache_key(), Duration::from_secs(60), {
///         let api = api.clone();
///         move || async move { api.user(1).await }
///     })
///     .await?;
/// println!("{}", user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct JsonPlaceholder<G> {
    gateway: G,
}

impl<G> JsonPlaceholder<G>
where
    G: FetchGateway,
{
    /// Creates a client that retrieves through `gateway`.
    #[must_use]
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Returns the underlying gateway.
    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Retrieves user `id`.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error.
    pub async fn user(&self, id: u32) -> Result<User> {
        self.gateway.fetch(&Resource::User(id)).await
    }

    /// Retrieves the posts written by user `user_id`.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error.
    pub async fn posts(&self, user_id: u32) -> Result<Vec<Post>> {
        self.gateway.fetch(&Resource::Posts { user_id }).await
    }

    /// Retrieves the comments on post `post_id`.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error.
    pub async fn comments(&self, post_id: u32) -> Result<Vec<Comment>> {
        self.gateway.fetch(&Resource::Comments { post_id }).await
    }

    /// Searches post titles for `query`, ignoring case.
    ///
    /// The API has no search endpoint, so every post is retrieved and filtered here. At
    /// most [`SEARCH_LIMIT`] matches are returned, in the API's order, each formatted as
    /// `Result for "<query>": <title>`.
    ///
    /// # Errors
    ///
    /// Propagates the gateway's error.
    pub async fn search(&self, query: &str) -> Result<Vec<String>> {
        let posts: Vec<Post> = self.gateway.fetch(&Resource::AllPosts).await?;
        Ok(matching_titles(&posts, query))
    }
}

fn matching_titles(posts: &[Post], query: &str) -> Vec<String> {
    let needle = query.to_lowercase();
    posts
        .iter()
        .filter(|post| post.title.to_lowercase().contains(&needle))
        .take(SEARCH_LIMIT)
        .map(|post| format!("Result for \"{query}\": {}", post.title))
        .collect()
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Display};

/// An addressable JSONPlaceholder resource.
///
/// Each resource has a request path relative to the gateway's base URL and a cache key
/// that identifies it in a cache.
///
/// # Examples
///
/// ```
/// use stashline_gateway::Resource;
///
/// let posts = Resource::Posts { user_id: 1 };
/// assert_eq!(posts.path(), "/posts?userId=1");
/// assert_eq!(posts.cache_key(), "posts-1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// A single user.
    User(u32),
    /// The posts written by a user.
    Posts {
        /// The author's id.
        user_id: u32,
    },
    /// The comments on a post.
    Comments {
        /// The post's id.
        post_id: u32,
    },
    /// Every post.
    AllPosts,
}

impl Resource {
    /// Returns the request path, including the query string.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::User(id) => format!("/users/{id}"),
            Self::Posts { user_id } => format!("/posts?userId={user_id}"),
            Self::Comments { post_id } => format!("/comments?postId={post_id}"),
            Self::AllPosts => "/posts".to_string(),
        }
    }

    /// Returns the key under which the resource is cached.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::User(id) => format!("user-{id}"),
            Self::Posts { user_id } => format!("posts-{user_id}"),
            Self::Comments { post_id } => format!("comments-{post_id}"),
            Self::AllPosts => "posts-all".to_string(),
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A host loop over a suspending cache: reads suspend until their fetch settles, then
//! answer synchronously.

use stashline::{Readiness, SuspenseCache};
use stashline_gateway::{Comment, GatewayConfig, HttpGateway, JsonPlaceholder, Resource};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
    let comments: SuspenseCache<Vec<Comment>> = SuspenseCache::builder().name("comments").build();

    let fetch = |post_id: u32| {
        let api = api.clone();
        move || async move { api.comments(post_id).await }
    };

    // Render two posts' comment sections; both suspend and load in parallel.
    let keys: Vec<_> = [1, 2].map(|post_id| (post_id, Resource::Comments { post_id }.cache_key())).into();
    let mut pending = Vec::new();
    for (post_id, key) in &keys {
        match comments.read(key, fetch(*post_id))? {
            Readiness::Ready(list) => println!("post {post_id}: {} comments", list.len()),
            Readiness::Suspended(suspension) => {
                println!("post {post_id}: loading...");
                pending.push(suspension);
            }
        }
    }
    futures::future::join_all(pending).await;

    for (post_id, key) in &keys {
        let list = comments.resolve(key, fetch(*post_id)).await?;
        println!("post {post_id}: {} comments, first by {}", list.len(), list.first().map_or("nobody", |c| c.email.as_str()));
    }

    Ok(())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A TTL cache in front of the JSONPlaceholder API: hits, expiry, invalidation and stats.

use std::time::Duration;

use stashline::TtlCache;
use stashline_gateway::{GatewayConfig, HttpGateway, JsonPlaceholder, Post, Resource};
use timekeep::Clock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
    let clock = Clock::new_system();
    let cache: TtlCache<Vec<Post>> = TtlCache::builder(clock.clone())
        .name("posts")
        .default_ttl(Duration::from_secs(5))
        .build();

    for user_id in [1, 2, 1, 1] {
        let stopwatch = clock.stopwatch();
        let api = api.clone();
        let lookup = cache.get_or_fetch(Resource::Posts { user_id }.cache_key(), move || async move { api.posts(user_id).await });
        let served_from_memory = lookup.is_hit();
        let posts = lookup.await?;
        println!(
            "user {user_id}: {} posts in {:?} ({})",
            posts.len(),
            stopwatch.elapsed(),
            if served_from_memory { "cache" } else { "network" }
        );
    }

    let removed = cache.invalidate_matching("^posts-1$")?;
    println!("invalidated {removed} entry");

    let stats = cache.stats();
    for entry in &stats.entries {
        println!("{}: age {:?}, {:?} left", entry.key, entry.age, entry.remaining());
    }
    println!(
        "{} entries, {} hits, {} misses, {} invalidated",
        stats.size, stats.activity.hits, stats.activity.misses, stats.activity.invalidated
    );

    Ok(())
}

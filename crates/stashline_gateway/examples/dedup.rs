// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Three components ask for the same user at once; only one request goes out.
//!
//! Run with `RUST_LOG=debug cargo run -p stashline_gateway --example dedup` to see the
//! gateway's request log.

use std::sync::Arc;

use coflight::Coordinator;
use stashline_gateway::{GatewayConfig, GatewayError, HttpGateway, JsonPlaceholder, Resource, User};
use timekeep::Clock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api = JsonPlaceholder::new(HttpGateway::new(&GatewayConfig::default())?);
    let group: Coordinator<String, Result<User, Arc<GatewayError>>> = Coordinator::new();
    let resource = Resource::User(1);
    let stopwatch = Clock::new_system().stopwatch();

    let flights: Vec<_> = ["header", "profile", "sidebar"]
        .into_iter()
        .map(|component| {
            let api = api.clone();
            let flight = group.request(resource.cache_key(), move || async move { api.user(1).await.map_err(Arc::new) });
            tracing::info!(component, role = ?flight.role(), "requested user");
            flight
        })
        .collect();

    for flight in flights {
        let user = flight.await?;
        println!("{} <{}>", user.name, user.email);
    }
    println!("three readers, one round trip, {:?}", stopwatch.elapsed());

    Ok(())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `Coordinator::request()`.

use std::{
    sync::{
        Arc,
        atomic::{
            AtomicBool, AtomicUsize,
            Ordering::{AcqRel, Acquire, Release},
        },
    },
    time::Duration,
};

use coflight::{Coordinator, Role, Spawner};
use futures_util::{FutureExt, StreamExt, stream::FuturesUnordered};
use tokio::sync::oneshot;

static_assertions::assert_impl_all!(Coordinator<String, String>: Send, Sync);
static_assertions::assert_impl_all!(Spawner: Send, Sync);

fn unreachable_future() -> std::future::Pending<String> {
    std::future::pending()
}

async fn wait_until_released<T>(group: &Coordinator<&'static str, T>, key: &'static str)
where
    T: Clone + Send + Sync + 'static,
{
    for _ in 0..1_000 {
        if !group.contains(&key) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("registration for {key} was never released");
}

#[tokio::test]
async fn direct_call() {
    let group = Coordinator::new();
    let flight = group.request("key", || async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        "Result".to_string()
    });

    assert_eq!(flight.role(), Role::Leader);
    assert_eq!(flight.await, "Result");
}

#[tokio::test]
async fn parallel_call() {
    let call_counter = Arc::new(AtomicUsize::default());

    let group = Coordinator::new();
    let futures = FuturesUnordered::new();
    for _ in 0..10 {
        let counter = Arc::clone(&call_counter);
        futures.push(group.request("key", move || async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            counter.fetch_add(1, AcqRel);
            "Result".to_string()
        }));
    }

    assert!(futures.all(|out| async move { out == "Result" }).await);
    assert_eq!(call_counter.load(Acquire), 1);
}

#[tokio::test]
async fn parallel_call_seq_await() {
    let call_counter = Arc::new(AtomicUsize::default());

    let group = Coordinator::new();
    let mut flights = Vec::new();
    for _ in 0..10 {
        let counter = Arc::clone(&call_counter);
        flights.push(group.request("key", move || {
            // Counted at invocation: followers must never reach this point.
            counter.fetch_add(1, AcqRel);
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "Result".to_string()
            }
        }));
    }

    assert_eq!(flights.iter().filter(|flight| flight.is_follower()).count(), 9);
    for flight in flights {
        assert_eq!(flight.await, "Result");
    }
    assert_eq!(call_counter.load(Acquire), 1);
}

#[tokio::test]
async fn call_with_custom_key() {
    #[derive(Clone, PartialEq, Eq, Hash)]
    struct K(i32);

    let group = Coordinator::new();
    let result = group
        .request(K(1), || async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            "Result".to_string()
        })
        .await;
    assert_eq!(result, "Result");
}

#[tokio::test]
async fn different_keys_do_not_coalesce() {
    let group = Coordinator::new();
    let first = group.request("user-1", || async { "one".to_string() });
    let second = group.request("user-2", || async { "two".to_string() });

    assert_eq!(first.role(), Role::Leader);
    assert_eq!(second.role(), Role::Leader);
    assert_eq!(group.len(), 2);

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first, "one");
    assert_eq!(second, "two");
    assert!(group.is_empty());
}

#[tokio::test]
async fn failure_is_shared_and_releases_key() {
    let group: Coordinator<&str, Result<String, String>> = Coordinator::new();
    let (release, gate) = oneshot::channel::<()>();
    let mut gate = Some(gate);

    let flights: Vec<_> = (0..3)
        .map(|_| {
            let gate = gate.take();
            group.request("x", || async move {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                Err("boom".to_string())
            })
        })
        .collect();
    release.send(()).expect("gate receiver is alive");

    for flight in flights {
        assert_eq!(flight.await, Err("boom".to_string()));
    }
    assert!(!group.contains(&"x"));

    let retry = group.request("x", || async { Ok("recovered".to_string()) });
    assert_eq!(retry.role(), Role::Leader);
    assert_eq!(retry.await, Ok("recovered".to_string()));
}

#[tokio::test]
async fn late_request_starts_new_operation() {
    let group = Coordinator::new();
    let early = group.request("key", || async { "first".to_string() });
    assert_eq!(early.await, "first");

    let late = group.request("key", || async { "second".to_string() });
    assert_eq!(late.role(), Role::Leader);
    assert_eq!(late.await, "second");
}

#[tokio::test]
async fn follower_joined_before_settling_gets_leader_outcome() {
    let group = Coordinator::new();
    let early = group.request("key".to_string(), || async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        "Result".to_string()
    });
    let late = group.request("key".to_string(), unreachable_future);

    assert_eq!(early.await, "Result");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(late.peek().map(String::as_str), Some("Result"));
    assert_eq!(late.await, "Result");
}

#[tokio::test]
async fn abandoned_operation_is_resumed_by_next_caller() {
    let group = Coordinator::new();
    let (release, gate) = oneshot::channel::<()>();

    let abandoned = group.request("key", || async move {
        let _ = gate.await;
        "Result".to_string()
    });
    let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;
    assert!(group.contains(&"key"));

    let next = group.request("key", unreachable_future);
    assert_eq!(next.role(), Role::Follower);

    release.send(()).expect("gate receiver is alive");
    assert_eq!(next.await, "Result");
    assert!(group.is_empty());
}

#[tokio::test]
async fn spawner_completes_operation_without_callers() {
    let group = Coordinator::with_spawner(Spawner::new_tokio());
    let (release, gate) = oneshot::channel::<()>();
    let completed = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&completed);
    let flight = group.request("key", move || async move {
        let _ = gate.await;
        flag.store(true, Release);
        "Result".to_string()
    });
    drop(flight);

    release.send(()).expect("gate receiver is alive");
    wait_until_released(&group, "key").await;

    assert!(completed.load(Acquire));
}

#[tokio::test]
async fn panicking_operation_releases_key() {
    let group: Arc<Coordinator<&'static str, u32>> = Arc::new(Coordinator::new());

    let leader_group = Arc::clone(&group);
    let leader = tokio::spawn(async move {
        leader_group
            .request("key", || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                panic!("operation panicked");
                #[expect(unreachable_code, reason = "Required to satisfy return type after panic")]
                0
            })
            .await
    });

    while !group.contains(&"key") {
        tokio::task::yield_now().await;
    }
    let follower = group.request("key", std::future::pending::<u32>);
    assert_eq!(follower.role(), Role::Follower);
    let follower = tokio::spawn(follower);

    assert!(leader.await.is_err());
    assert!(follower.await.is_err());
    assert!(!group.contains(&"key"));

    let next = group.request("key", || async { 7 });
    assert_eq!(next.role(), Role::Leader);
    assert_eq!(next.await, 7);
    assert!(group.is_empty());
}

#[test]
fn inline_spawner_settles_operation_before_request_returns() {
    let group = Coordinator::with_spawner(Spawner::new_custom(|work| {
        let _ = work.now_or_never();
    }));

    let flight = group.request("key", || async { 7 });

    assert_eq!(flight.peek(), Some(&7));
    assert!(group.is_empty());
}

#[test]
fn register_defers_spawning_until_launch() {
    let spawned = Arc::new(AtomicUsize::default());
    let counter = Arc::clone(&spawned);
    let group: Coordinator<&str, u32> = Coordinator::with_spawner(Spawner::new_custom(move |_work| {
        counter.fetch_add(1, AcqRel);
    }));

    let leader = group.register("key", std::future::pending::<u32>);
    assert_eq!(spawned.load(Acquire), 0);
    assert!(group.contains(&"key"));

    group.launch(&leader);
    assert_eq!(spawned.load(Acquire), 1);

    let follower = group.register("key", std::future::pending::<u32>);
    group.launch(&follower);
    assert_eq!(spawned.load(Acquire), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_callers_share_one_operation() {
    let call_counter = Arc::new(AtomicUsize::default());
    let group: Arc<Coordinator<String, String>> = Arc::new(Coordinator::new());
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(parking_lot::Mutex::new(Some(gate)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let group = Arc::clone(&group);
        let counter = Arc::clone(&call_counter);
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            group
                .request("user:123".to_string(), move || {
                    counter.fetch_add(1, AcqRel);
                    let gate = gate.lock().take();
                    async move {
                        if let Some(gate) = gate {
                            let _ = gate.await;
                        }
                        "UserData".to_string()
                    }
                })
                .await
        }));
    }

    while group.is_empty() {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).expect("gate receiver is alive");

    for handle in handles {
        assert_eq!(handle.await.expect("task panicked"), "UserData");
    }
    assert_eq!(call_counter.load(Acquire), 1);
}

#[tokio::test]
async fn debug_impl() {
    let group: Coordinator<String, String> = Coordinator::new();
    assert!(format!("{group:?}").contains("Coordinator"));

    let flight = group.request("key".to_string(), || async { "Result".to_string() });
    assert!(format!("{flight:?}").contains("Leader"));
    assert_eq!(flight.await, "Result");
}

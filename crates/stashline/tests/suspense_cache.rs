// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `SuspenseCache`.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use stashline::{EntryStatus, Readiness, Spawner, SuspenseCache, Suspension};
use tokio::sync::oneshot;
use tracing_test::traced_test;

static_assertions::assert_impl_all!(SuspenseCache<Vec<u32>>: Send, Sync, Clone);
static_assertions::assert_impl_all!(Suspension: Send, Sync, Clone, Unpin);

#[derive(Clone, Debug, PartialEq, Eq)]
struct Post {
    id: u32,
}

/// A producer that counts its invocations and yields `outcome` once `gate` fires.
fn gated<T>(calls: &Arc<AtomicUsize>, gate: oneshot::Receiver<()>, outcome: io::Result<T>) -> impl FnOnce() -> BoxFuture<'static, io::Result<T>> + use<T>
where
    T: Send + 'static,
{
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let _ = gate.await;
            outcome
        })
    }
}

fn unexpected_fetch() -> std::future::Ready<io::Result<Vec<Post>>> {
    panic!("the entry already exists, no fetch may start")
}

fn suspension_of<V>(readiness: Readiness<V>) -> Suspension {
    match readiness {
        Readiness::Suspended(suspension) => suspension,
        Readiness::Ready(_) => panic!("expected the read to suspend"),
    }
}

#[tokio::test]
async fn simultaneous_reads_suspend_on_one_fetch() {
    let cache = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    let first = cache
        .read("posts-1", gated(&calls, gate, Ok(vec![Post { id: 1 }])))
        .expect("no failure yet");
    let second = cache.read("posts-1", unexpected_fetch).expect("no failure yet");
    assert_eq!(cache.status("posts-1"), Some(EntryStatus::Pending));

    let (first, second) = (suspension_of(first), suspension_of(second));
    release.send(()).expect("gate is alive");
    tokio::join!(first, second);

    for _ in 0..2 {
        let posts = cache.read("posts-1", unexpected_fetch).expect("resolved").ready();
        assert_eq!(posts, Some(vec![Post { id: 1 }]));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_only_moves_forward() {
    let cache = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    assert_eq!(cache.status("user-1"), None);
    let suspension = suspension_of(cache.read("user-1", gated(&calls, gate, Ok(1_u32))).expect("no failure yet"));
    assert_eq!(cache.status("user-1"), Some(EntryStatus::Pending));
    assert!(!suspension.is_settled());

    release.send(()).expect("gate is alive");
    suspension.await;
    assert_eq!(cache.status("user-1"), Some(EntryStatus::Resolved));

    // Later reads with other producers neither refetch nor regress the entry.
    for value in [2, 3] {
        let readiness = cache
            .read("user-1", move || async move { Ok::<_, io::Error>(value) })
            .expect("resolved");
        assert_eq!(readiness.ready(), Some(1));
        assert_eq!(cache.status("user-1"), Some(EntryStatus::Resolved));
    }
}

#[tokio::test]
async fn rejection_is_sticky_until_invalidated() {
    let cache: SuspenseCache<u32> = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    let suspension = suspension_of(
        cache
            .read("user-1", gated(&calls, gate, Err(io::Error::other("404 Not Found"))))
            .expect("no failure yet"),
    );
    release.send(()).expect("gate is alive");
    suspension.await;
    assert_eq!(cache.status("user-1"), Some(EntryStatus::Rejected));

    for _ in 0..2 {
        let error = cache
            .read("user-1", || async { Ok::<_, io::Error>(1) })
            .expect_err("failure is remembered");
        assert_eq!(error.source_as::<io::Error>().map(ToString::to_string).as_deref(), Some("404 Not Found"));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(cache.invalidate("user-1"));
    assert!(!cache.invalidate("user-1"));
    let value = cache
        .resolve("user-1", || async { Ok::<_, io::Error>(7) })
        .await
        .expect("refetch succeeds");
    assert_eq!(value, 7);
}

#[tokio::test]
async fn activity_counts_reads_and_settlements() {
    let cache: SuspenseCache<u32> = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    let suspension = suspension_of(
        cache
            .read("user-1", gated(&calls, gate, Err(io::Error::other("503 Service Unavailable"))))
            .expect("no failure yet"),
    );
    let _joined = cache.read("user-1", || async { Ok::<_, io::Error>(1) }).expect("still pending");
    release.send(()).expect("gate is alive");
    suspension.await;

    for _ in 0..2 {
        let _ = cache.read("user-1", || async { Ok::<_, io::Error>(1) });
    }
    cache.invalidate("user-1");
    cache.resolve("user-1", || async { Ok::<_, io::Error>(2) }).await.expect("refetch succeeds");

    let activity = cache.activity();
    assert_eq!(activity.misses, 2);
    assert_eq!(activity.joined, 1);
    assert_eq!(activity.fetch_failures, 1);
    assert_eq!(activity.rejected, 2);
    assert_eq!(activity.invalidated, 1);
    assert_eq!(activity.inserted, 1);
    assert_eq!(activity.hits, 1);
    assert_eq!(activity.expired, 0);
}

#[tokio::test]
async fn panicking_fetch_rejects_entry() {
    let cache: SuspenseCache<u32> = SuspenseCache::new();

    let suspension = suspension_of(
        cache
            .read("user-1", || async {
                tokio::time::sleep(Duration::from_millis(1)).await;
                panic!("decoder blew up");
                #[expect(unreachable_code, reason = "Required to satisfy return type after panic")]
                Ok::<u32, io::Error>(0)
            })
            .expect("no failure yet"),
    );
    suspension.await;

    assert_eq!(cache.status("user-1"), Some(EntryStatus::Rejected));
    let error = cache
        .read("user-1", || async { Ok::<_, io::Error>(1) })
        .expect_err("the panic is remembered as a failure");
    assert!(error.to_string().contains("decoder blew up"), "unexpected error: {error}");

    assert!(cache.invalidate("user-1"));
    let value = cache
        .resolve("user-1", || async { Ok::<_, io::Error>(7) })
        .await
        .expect("refetch succeeds");
    assert_eq!(value, 7);
}

#[test]
fn inline_spawner_settles_before_read_returns() {
    let cache = SuspenseCache::builder()
        .spawner(Spawner::new_custom(|work| futures::executor::block_on(work)))
        .build();

    let suspension = suspension_of(cache.read("posts-1", || async { Ok::<_, io::Error>(vec![1_u32]) }).expect("no failure yet"));

    assert!(suspension.is_settled());
    assert_eq!(cache.status("posts-1"), Some(EntryStatus::Resolved));
    let posts = cache.read("posts-1", unexpected_fetch_u32).expect("resolved").ready();
    assert_eq!(posts, Some(vec![1]));
}

#[tokio::test]
async fn outcome_after_clear_does_not_recreate_entry() {
    let cache = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    let suspension = suspension_of(cache.read("posts-1", gated(&calls, gate, Ok(vec![1_u32]))).expect("no failure yet"));
    assert_eq!(cache.clear(), 1);

    release.send(()).expect("gate is alive");
    suspension.await;

    assert_eq!(cache.status("posts-1"), None);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn outcome_after_clear_settles_only_its_own_entry() {
    let cache = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    let old = suspension_of(cache.read("posts-1", gated(&calls, gate, Ok(vec![1_u32]))).expect("no failure yet"));
    cache.clear();

    // The newer entry attaches to the fetch still in flight instead of starting another.
    let newer = suspension_of(cache.read("posts-1", unexpected_fetch_u32).expect("no failure yet"));

    release.send(()).expect("gate is alive");
    old.await;
    assert_eq!(cache.status("posts-1"), Some(EntryStatus::Pending));

    newer.await;
    assert_eq!(cache.status("posts-1"), Some(EntryStatus::Resolved));
    let posts = cache.read("posts-1", unexpected_fetch_u32).expect("resolved").ready();
    assert_eq!(posts, Some(vec![1]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

fn unexpected_fetch_u32() -> std::future::Ready<io::Result<Vec<u32>>> {
    panic!("a fetch for this key is already in flight")
}

#[tokio::test]
async fn resolve_waits_for_the_value() {
    let cache = SuspenseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in_producer = Arc::clone(&calls);

    let producer = move || {
        calls_in_producer.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, io::Error>("Leanne Graham".to_string())
        }
    };

    let (first, second) = tokio::join!(cache.resolve("user-1", producer.clone()), cache.resolve("user-1", producer));

    assert_eq!(first.expect("resolves"), "Leanne Graham");
    assert_eq!(second.expect("resolves"), "Leanne Graham");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn spawner_settles_entries_without_readers() {
    let cache = SuspenseCache::builder().spawner(Spawner::new_tokio()).build();
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();

    drop(cache.read("comments-1", gated(&calls, gate, Ok(vec![1_u32, 2]))));
    release.send(()).expect("gate is alive");

    for _ in 0..1_000 {
        if cache.status("comments-1") == Some(EntryStatus::Resolved) {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(cache.status("comments-1"), Some(EntryStatus::Resolved));
}

#[tokio::test]
#[traced_test]
async fn reads_are_logged() {
    let cache = SuspenseCache::builder().name("post_reader").build();

    let _ = cache.resolve("posts-1", || async { Ok::<_, io::Error>(1) }).await;

    assert!(logs_contain("post_reader"));
    assert!(logs_contain("cache.read"));
    assert!(logs_contain("cache.miss"));
    assert!(logs_contain("cache.hit"));
}

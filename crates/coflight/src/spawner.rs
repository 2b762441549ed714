// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;

use futures_util::future::BoxFuture;

type CustomSpawn = Arc<dyn Fn(BoxFuture<'static, ()>) + Send + Sync>;

/// Runs detached operations on an async runtime.
///
/// A coordinator configured with a spawner hands each new operation to it, so the operation
/// completes even when no caller is awaiting it anymore.
///
/// # Examples
///
/// ```
/// use coflight::Spawner;
///
/// let spawner = Spawner::new_custom(|work| {
///     std::thread::spawn(move || futures_util::FutureExt::now_or_never(work));
/// });
/// spawner.spawn(Box::pin(async {}));
/// ```
#[derive(Clone)]
pub struct Spawner(Kind);

#[derive(Clone)]
enum Kind {
    #[cfg(feature = "tokio")]
    Tokio(tokio::runtime::Handle),
    Custom(CustomSpawn),
}

impl Spawner {
    /// Creates a spawner for the Tokio runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[cfg(feature = "tokio")]
    #[must_use]
    pub fn new_tokio() -> Self {
        Self(Kind::Tokio(tokio::runtime::Handle::current()))
    }

    /// Creates a spawner that passes every operation to `spawn`.
    pub fn new_custom(spawn: impl Fn(BoxFuture<'static, ()>) + Send + Sync + 'static) -> Self {
        Self(Kind::Custom(Arc::new(spawn)))
    }

    /// Detaches `work` onto the runtime. Its completion is not observed.
    pub fn spawn(&self, work: BoxFuture<'static, ()>) {
        match &self.0 {
            #[cfg(feature = "tokio")]
            Kind::Tokio(handle) => drop(handle.spawn(work)),
            Kind::Custom(spawn) => spawn(work),
        }
    }
}

impl Debug for Spawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.0 {
            #[cfg(feature = "tokio")]
            Kind::Tokio(_) => "tokio",
            Kind::Custom(_) => "custom",
        };
        f.debug_tuple("Spawner").field(&kind).finish()
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;

use crate::{Operation, Settled};

/// How a caller got attached to an in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The caller's producer was invoked and started the operation.
    Leader,
    /// The caller joined an operation that was already in flight; its producer was dropped.
    Follower,
}

/// A handle to the in-flight operation for one key.
///
/// Awaiting a flight yields a clone of the operation's outcome. Any number of flights may
/// refer to the same operation and all of them observe the identical outcome. Dropping a
/// flight only stops that caller waiting; it never cancels the operation for the others.
///
/// # Panics
///
/// Polling a flight panics if its operation panicked.
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[derive(Clone)]
pub struct Flight<T> {
    operation: Operation<T>,
    role: Role,
}

impl<T> Flight<T> {
    pub(crate) fn new(operation: Operation<T>, role: Role) -> Self {
        Self { operation, role }
    }

    /// Returns whether this caller started the operation or joined it.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` if this caller joined an operation that was already in flight.
    #[must_use]
    pub fn is_follower(&self) -> bool {
        self.role == Role::Follower
    }

    pub(crate) fn operation(&self) -> Operation<T> {
        self.operation.clone()
    }
}

impl<T: Clone> Flight<T> {
    /// Returns the outcome if the operation has already settled without panicking.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.operation.peek().and_then(|settled| settled.as_ref().ok())
    }
}

impl<T: Clone> Future for Flight<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.operation.poll_unpin(cx).map(|settled: Settled<T>| match settled {
            Ok(outcome) => outcome,
            Err(panicked) => panicked.resume(),
        })
    }
}

impl<T> Debug for Flight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight").field("role", &self.role).finish_non_exhaustive()
    }
}

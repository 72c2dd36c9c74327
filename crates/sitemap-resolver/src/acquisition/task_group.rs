//! Bounded task group with first-error cancellation.
//!
//! At most `limit` units run at once. The first unit to fail records its
//! error and cancels the shared token, after which no further unit is
//! spawned. Running units are never dropped by the group: they watch
//! [`TaskGroup::token`] and decide for themselves where to stop.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct TaskGroup<E> {
    tasks: JoinSet<()>,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    first_error: Arc<Mutex<Option<E>>>,
}

impl<E: Send + 'static> TaskGroup<E> {
    /// Create a group running at most `limit` units concurrently.
    ///
    /// A `limit` of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self::with_token(limit, CancellationToken::new())
    }

    /// Create a group whose token is `token`; cancelling it stops the group.
    pub fn with_token(limit: usize, token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
            token,
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// The group's cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn `unit` once a slot is free.
    ///
    /// Waits while the group is saturated. Returns `false` without spawning
    /// if the group was cancelled first.
    pub async fn spawn<F>(&mut self, unit: F) -> bool
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.token.cancelled() => return false,
            permit = Arc::clone(&self.semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let token = self.token.clone();
        let first_error = Arc::clone(&self.first_error);
        self.tasks.spawn(async move {
            let _permit = permit;
            if let Err(err) = unit.await {
                record_error(&first_error, &token, err);
            }
        });
        true
    }

    /// Wait for every spawned unit to finish and return the first error, if
    /// any.
    pub async fn wait(mut self) -> Result<(), E> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }
        let first = match self.first_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn record_error<E>(slot: &Mutex<Option<E>>, token: &CancellationToken, err: E) {
    let mut slot = match slot.lock() {
        Ok(slot) => slot,
        Err(poisoned) => poisoned.into_inner(),
    };
    if slot.is_none() {
        *slot = Some(err);
        token.cancel();
    }
}

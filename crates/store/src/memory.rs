use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};

/// In-memory store holding one service's private state.
///
/// Cloning the store clones the handle, not the data; all clones see the same
/// state. Writers are serialized by the lock, so a command handler and a
/// replica handler of the same service never interleave inside a unit of work.
#[derive(Debug, Default)]
pub struct Store<S> {
    state: Arc<RwLock<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    /// Creates a store with the given initial state.
    pub fn new(state: S) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Read-only access to the committed state.
    pub async fn read(&self) -> RwLockReadGuard<'_, S> {
        self.state.read().await
    }

    /// Starts a unit of work.
    ///
    /// The unit holds the write lock until it is committed or dropped.
    pub async fn begin(&self) -> UnitOfWork<S> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let working = S::clone(&guard);
        UnitOfWork { guard, working }
    }

    /// Runs `work` inside a unit of work: commits on `Ok`, rolls back on `Err`.
    pub async fn transact<T, E>(&self, work: impl FnOnce(&mut S) -> Result<T, E>) -> Result<T, E> {
        let mut uow = self.begin().await;
        match work(&mut *uow) {
            Ok(value) => {
                uow.commit();
                Ok(value)
            }
            Err(e) => {
                uow.rollback();
                Err(e)
            }
        }
    }
}

/// A pending set of changes to a [`Store`].
///
/// Changes are made to a private copy of the state; [`commit`](Self::commit)
/// publishes them atomically. Dropping the unit without committing discards
/// every change.
#[derive(Debug)]
pub struct UnitOfWork<S> {
    guard: OwnedRwLockWriteGuard<S>,
    working: S,
}

impl<S> UnitOfWork<S> {
    /// Makes all changes visible.
    pub fn commit(self) {
        let UnitOfWork { mut guard, working } = self;
        *guard = working;
        metrics::counter!("store_commits_total").increment(1);
    }

    /// Discards all changes.
    pub fn rollback(self) {
        metrics::counter!("store_rollbacks_total").increment(1);
        tracing::debug!("unit of work rolled back");
    }
}

impl<S> Deref for UnitOfWork<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.working
    }
}

impl<S> DerefMut for UnitOfWork<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.working
    }
}

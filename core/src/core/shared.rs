// conductor/src/core/shared.rs
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared ownership of one execution's mutable state, serialized through a
/// `parking_lot::Mutex` scoped to that execution alone.
///
/// The lock is only reachable through [`Shared::with`] and
/// [`Shared::snapshot`], so no guard outlives a call or crosses an `.await`.
#[derive(Debug)]
pub struct Shared<T: Send + 'static>(Arc<Mutex<T>>);

impl<T: Send + 'static> Shared<T> {
  pub fn new(data: T) -> Self {
    Shared(Arc::new(Mutex::new(data)))
  }

  /// Runs `f` under the lock and releases it before returning.
  pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    let mut guard = self.0.lock();
    f(&mut guard)
  }
}

impl<T: Clone + Send + 'static> Shared<T> {
  /// Clones the current state out from under the lock.
  pub fn snapshot(&self) -> T {
    self.0.lock().clone()
  }
}

impl<T: Send + 'static> Clone for Shared<T> {
  fn clone(&self) -> Self {
    Shared(Arc::clone(&self.0))
  }
}

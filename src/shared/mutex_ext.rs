//! Usage: Poison-tolerant locking for state that must stay readable after a panic.

use std::sync::{Mutex, MutexGuard};

pub(crate) trait MutexExt<T> {
    /// Lock, recovering the inner value if a previous holder panicked.
    fn lock_or_recover(&self) -> MutexGuard<'_, T>;

    /// Run `f` under the lock; the guard never escapes the call.
    fn with_locked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[track_caller]
    fn lock_or_recover(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|poisoned| {
            let caller = std::panic::Location::caller();
            tracing::error!(
                mutex_type = std::any::type_name::<T>(),
                caller = %caller,
                "lock poisoned by a panicked holder; continuing with last written state"
            );
            self.clear_poison();
            poisoned.into_inner()
        })
    }

    #[track_caller]
    fn with_locked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock_or_recover();
        f(&mut guard)
    }
}

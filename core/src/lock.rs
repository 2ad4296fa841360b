use std::sync::{Arc, OnceLock};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static GLOBAL_LOCK: OnceLock<LibraryLock> = OnceLock::new();

/// A reentrant lock held around every call into a decode library that is not
/// safe to call from several threads at once.
///
/// Cursors over the same non-thread-safe backend should share one lock. Clones
/// refer to the same underlying lock.
#[derive(Clone, Default)]
pub struct LibraryLock {
    inner: Arc<ReentrantMutex<()>>,
}

impl LibraryLock {
    /// Create a new lock that is not shared with anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance.
    pub fn global() -> Self {
        GLOBAL_LOCK.get_or_init(LibraryLock::new).clone()
    }

    /// Block until the lock is held by this thread.
    pub fn acquire(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.lock()
    }

    /// Whether `self` and `other` are the same lock.
    pub fn same_as(&self, other: &LibraryLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for LibraryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLock")
            .field("shared_by", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Hold `lock` (if there is one) for the duration of `f`.
pub(crate) fn with_library<T>(lock: &Option<LibraryLock>, f: impl FnOnce() -> T) -> T {
    let _guard = lock.as_ref().map(|lock| lock.acquire());
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_is_shared() {
        let a = LibraryLock::global();
        let b = LibraryLock::global();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&LibraryLock::new()));
    }

    #[test]
    fn lock_is_reentrant() {
        let lock = LibraryLock::new();
        let _outer = lock.acquire();
        let value = with_library(&Some(lock.clone()), || 7);
        assert_eq!(value, 7);
    }
}

//! Lock helpers for the shared caches
//!
//! Cache maps live behind `std::sync` locks. A panic while holding one of them
//! poisons the lock; the strict helpers turn that into a domain error through
//! a caller supplied constructor, the `*_recovering` helpers log and keep using
//! the inner data. Cache contents stay structurally valid after a panic (every
//! mutation is a single map operation), so the read paths recover.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lock a mutex, mapping poisoning into the caller's error type
pub fn lock_mutex<'a, T, E>(
    mutex: &'a Mutex<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    mutex.lock().map_err(|_| {
        error_constructor(format!(
            "Internal synchronisation error ({} mutex poisoned). A panic occurred while holding the lock.",
            what
        ))
    })
}

/// Read-lock an RwLock, mapping poisoning into the caller's error type
pub fn read_lock<'a, T, E>(
    lock: &'a RwLock<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    lock.read().map_err(|_| {
        error_constructor(format!(
            "Internal synchronisation error ({} read lock poisoned). A panic occurred while holding the write lock.",
            what
        ))
    })
}

/// Write-lock an RwLock, mapping poisoning into the caller's error type
pub fn write_lock<'a, T, E>(
    lock: &'a RwLock<T>,
    what: &str,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    lock.write().map_err(|_| {
        error_constructor(format!(
            "Internal synchronisation error ({} write lock poisoned). A panic occurred while holding the lock.",
            what
        ))
    })
}

pub fn lock_recovering<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned {} mutex", what);
        poisoned.into_inner()
    })
}

pub fn read_recovering<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned {} read lock", what);
        poisoned.into_inner()
    })
}

pub fn write_recovering<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned {} write lock", what);
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct TestError {
        message: String,
    }

    fn poisoned_mutex() -> Arc<Mutex<i32>> {
        let mutex = Arc::new(Mutex::new(42));
        let mutex_clone = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("Intentional panic to poison mutex");
        })
        .join();
        mutex
    }

    #[test]
    fn test_lock_mutex_success() {
        let mutex = Mutex::new(42);
        let guard = lock_mutex(&mutex, "test", |msg| TestError { message: msg }).unwrap();
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_lock_mutex_poisoned() {
        let mutex = poisoned_mutex();

        let result = lock_mutex(&mutex, "suggestions", |msg| TestError { message: msg });

        let error = result.unwrap_err();
        assert!(error.message.contains("suggestions mutex poisoned"));
    }

    #[test]
    fn test_lock_recovering_returns_inner_data() {
        let mutex = poisoned_mutex();

        let guard = lock_recovering(&mutex, "test");
        assert_eq!(*guard, 42);
    }

    #[test]
    fn test_rwlock_helpers() {
        let rwlock = RwLock::new(42);

        *write_lock(&rwlock, "test", |msg| TestError { message: msg }).unwrap() = 100;
        assert_eq!(*read_lock(&rwlock, "test", |msg| TestError { message: msg }).unwrap(), 100);

        *write_recovering(&rwlock, "test") += 1;
        assert_eq!(*read_recovering(&rwlock, "test"), 101);
    }
}

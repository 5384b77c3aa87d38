//! Busy-wait mutual exclusion.
//!
//! `SpinLock` never parks the calling thread. It is meant for critical
//! sections that last a handful of instructions, such as pushing to or
//! scanning a short subscriber list. Holding it across blocking work will
//! burn a core on every waiting thread.
//!
//! There is no fairness: when the lock is released any spinning thread may
//! win the next acquisition, so a thread can in principle be starved under
//! sustained contention.

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// A test-and-set spin lock protecting a value of type `T`.
pub struct SpinLock<T: ?Sized> {
    /// Set while some thread holds the lock
    locked: AtomicBool,

    /// The protected value
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `locked`, so sharing the lock
// only requires that the value can move between threads.
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

/// RAII guard returned by [`SpinLock::lock`]; releases the lock on drop.
#[must_use = "if unused the SpinLock will immediately unlock"]
pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

impl<T> SpinLock<T> {
    /// Create a new, unlocked spin lock.
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the lock and return the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Acquire the lock, spinning until it becomes available.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while !self.try_acquire() {
            // Spin on a plain load so waiters don't keep the cache line exclusive.
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
        SpinLockGuard { lock: self }
    }

    /// Attempt to acquire the lock once without spinning.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.try_acquire() {
            Some(SpinLockGuard { lock: self })
        } else {
            None
        }
    }

    /// Check whether the lock is currently held by anyone.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Get a mutable reference to the value without locking.
    ///
    /// The exclusive borrow proves no guard can be alive.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Release the lock without a guard.
    ///
    /// # Safety
    ///
    /// The caller must own the lock through a guard that was leaked with
    /// `std::mem::forget`, and must not use that guard's borrow afterwards.
    pub unsafe fn force_unlock(&self) {
        debug_assert!(self.is_locked(), "force_unlock on an unlocked SpinLock");
        self.locked.store(false, Ordering::Release);
    }

    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("data", &&*guard).finish(),
            None => f.write_str("SpinLock { <locked> }"),
        }
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_spin_lock_basic() {
        let lock = SpinLock::new(5);

        {
            let mut guard = lock.lock();
            assert!(lock.is_locked());
            *guard += 1;
        }

        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 6);
    }

    #[test]
    fn test_spin_lock_try_lock() {
        let lock = SpinLock::new(());

        let guard = lock.try_lock();
        assert!(guard.is_some());

        // Held, so a second attempt must fail immediately
        assert!(lock.try_lock().is_none());

        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_spin_lock_force_unlock() {
        let lock = SpinLock::new(1);

        std::mem::forget(lock.lock());
        assert!(lock.try_lock().is_none());

        unsafe { lock.force_unlock() };
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_spin_lock_contention() {
        let lock = Arc::new(SpinLock::new(0usize));
        let threads = 8;
        let increments_per_thread = 10_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..increments_per_thread {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.lock(), threads * increments_per_thread);
    }

    #[test]
    fn test_spin_lock_released_on_panic() {
        let lock = Arc::new(SpinLock::new(0));
        let lock_clone = Arc::clone(&lock);

        let result = thread::spawn(move || {
            let _guard = lock_clone.lock();
            panic!("holder panicked");
        })
        .join();

        assert!(result.is_err());
        assert!(!lock.is_locked());
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_spin_lock_debug() {
        let lock = SpinLock::new(3);
        assert_eq!(format!("{:?}", lock), "SpinLock { data: 3 }");

        let _guard = lock.lock();
        assert_eq!(format!("{:?}", lock), "SpinLock { <locked> }");
    }
}

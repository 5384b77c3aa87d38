//! Reader/writer spin lock with writer preference.
//!
//! The lock is built from three atomics:
//!
//! - `readers`: the number of active readers
//! - `gate`: a short-lived flag every acquirer passes through
//! - `writer`: held for the whole of a write section, and touched briefly
//!   by readers on their way in
//!
//! A reader takes `gate`, takes and immediately releases `writer`, bumps
//! `readers` and releases `gate`. A writer takes `gate` and `writer`, spins
//! until `readers` reaches zero, then releases `gate` and keeps `writer`
//! until it is done.
//!
//! Once a writer owns `writer` no new reader can get in, so readers cannot
//! starve a writer. The converse is not true: a writer still waits for every
//! reader that was already inside when it arrived.

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A reader/writer spin lock protecting a value of type `T`.
pub struct RwSpinLock<T: ?Sized> {
    /// Number of readers currently inside
    readers: AtomicUsize,

    /// Entry gate serializing acquirers
    gate: AtomicBool,

    /// Writer exclusion flag
    writer: AtomicBool,

    /// The protected value
    data: UnsafeCell<T>,
}

// SAFETY: readers share `&T` across threads and writers get `&mut T`, the
// same requirements as `std::sync::RwLock`.
unsafe impl<T: ?Sized + Send> Send for RwSpinLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinLock<T> {}

/// Shared access guard; releases read access on drop.
#[must_use = "if unused the RwSpinLock will immediately release read access"]
pub struct RwSpinReadGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

/// Exclusive access guard; releases write access on drop.
#[must_use = "if unused the RwSpinLock will immediately release write access"]
pub struct RwSpinWriteGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

fn spin_acquire(flag: &AtomicBool) {
    while !try_acquire(flag) {
        while flag.load(Ordering::Relaxed) {
            hint::spin_loop();
        }
    }
}

fn try_acquire(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_ok()
}

fn release(flag: &AtomicBool) {
    flag.store(false, Ordering::Release);
}

impl<T> RwSpinLock<T> {
    /// Create a new, unlocked reader/writer spin lock.
    pub const fn new(value: T) -> Self {
        Self {
            readers: AtomicUsize::new(0),
            gate: AtomicBool::new(false),
            writer: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the lock and return the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwSpinLock<T> {
    /// Acquire shared access, spinning while a writer holds or waits for the lock.
    pub fn read(&self) -> RwSpinReadGuard<'_, T> {
        spin_acquire(&self.gate);
        spin_acquire(&self.writer);
        release(&self.writer);
        self.readers.fetch_add(1, Ordering::AcqRel);
        release(&self.gate);
        RwSpinReadGuard { lock: self }
    }

    /// Attempt to acquire shared access without spinning.
    pub fn try_read(&self) -> Option<RwSpinReadGuard<'_, T>> {
        if !try_acquire(&self.gate) {
            return None;
        }
        if !try_acquire(&self.writer) {
            release(&self.gate);
            return None;
        }
        release(&self.writer);
        self.readers.fetch_add(1, Ordering::AcqRel);
        release(&self.gate);
        Some(RwSpinReadGuard { lock: self })
    }

    /// Acquire exclusive access, spinning until all current readers leave.
    pub fn write(&self) -> RwSpinWriteGuard<'_, T> {
        spin_acquire(&self.gate);
        spin_acquire(&self.writer);
        while self.readers.load(Ordering::Acquire) != 0 {
            hint::spin_loop();
        }
        release(&self.gate);
        RwSpinWriteGuard { lock: self }
    }

    /// Attempt to acquire exclusive access without spinning.
    pub fn try_write(&self) -> Option<RwSpinWriteGuard<'_, T>> {
        if !try_acquire(&self.gate) {
            return None;
        }
        if !try_acquire(&self.writer) {
            release(&self.gate);
            return None;
        }
        if self.readers.load(Ordering::Acquire) != 0 {
            release(&self.writer);
            release(&self.gate);
            return None;
        }
        release(&self.gate);
        Some(RwSpinWriteGuard { lock: self })
    }

    /// Number of readers currently holding the lock.
    pub fn reader_count(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    /// Whether a writer holds, or is waiting to take, the lock.
    pub fn is_write_locked(&self) -> bool {
        self.writer.load(Ordering::Relaxed)
    }

    /// Get a mutable reference to the value without locking.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn read_done(&self) {
        let previous = self.readers.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "read access released more often than taken");
    }
}

impl<T: Default> Default for RwSpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f
                .debug_struct("RwSpinLock")
                .field("data", &&*guard)
                .finish(),
            None => f.write_str("RwSpinLock { <locked> }"),
        }
    }
}

impl<'a, T: ?Sized> RwSpinWriteGuard<'a, T> {
    /// Turn exclusive access into shared access.
    ///
    /// The reader count is raised before the writer flag is dropped, so no
    /// other writer can slip in between.
    pub fn downgrade(self) -> RwSpinReadGuard<'a, T> {
        let lock = self.lock;
        mem::forget(self);
        lock.readers.fetch_add(1, Ordering::AcqRel);
        release(&lock.writer);
        RwSpinReadGuard { lock }
    }
}

impl<T: ?Sized> Deref for RwSpinReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: no writer can be active while a read guard exists.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.read_done();
    }
}

impl<T: ?Sized> Deref for RwSpinWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the write guard is the only accessor.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwSpinWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the write guard is the only accessor.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinWriteGuard<'_, T> {
    fn drop(&mut self) {
        release(&self.lock.writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_rw_spin_lock_basic() {
        let lock = RwSpinLock::new(10);

        {
            let first = lock.read();
            let second = lock.read();
            assert_eq!(*first + *second, 20);
            assert_eq!(lock.reader_count(), 2);
        }

        {
            let mut writer = lock.write();
            *writer = 20;
            assert!(lock.is_write_locked());
        }

        assert_eq!(lock.reader_count(), 0);
        assert!(!lock.is_write_locked());
        assert_eq!(*lock.read(), 20);
    }

    #[test]
    fn test_rw_spin_lock_try_variants() {
        let lock = RwSpinLock::new(());

        let reader = lock.try_read().expect("free lock must grant read access");
        assert!(lock.try_write().is_none());
        assert!(lock.try_read().is_some());
        drop(reader);

        let writer = lock.try_write().expect("free lock must grant write access");
        assert!(lock.try_read().is_none());
        assert!(lock.try_write().is_none());
        drop(writer);

        assert!(lock.try_write().is_some());
    }

    #[test]
    fn test_rw_spin_lock_failed_try_write_leaves_lock_usable() {
        let lock = RwSpinLock::new(0);

        let reader = lock.read();
        assert!(lock.try_write().is_none());
        assert!(!lock.is_write_locked());
        drop(reader);

        *lock.write() += 1;
        assert_eq!(*lock.read(), 1);
    }

    #[test]
    fn test_rw_spin_lock_downgrade() {
        let lock = RwSpinLock::new(1);

        let mut writer = lock.write();
        *writer = 2;
        let reader = writer.downgrade();

        assert_eq!(*reader, 2);
        assert_eq!(lock.reader_count(), 1);
        assert!(!lock.is_write_locked());

        // Other readers may join, writers may not
        assert!(lock.try_read().is_some());
        assert!(lock.try_write().is_none());

        drop(reader);
        assert!(lock.try_write().is_some());
    }

    #[test]
    fn test_rw_spin_lock_multiple_readers() {
        let lock = Arc::new(RwSpinLock::new(42));
        let readers = 4;
        let barrier = Arc::new(Barrier::new(readers));

        let handles: Vec<_> = (0..readers)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let guard = lock.read();
                    // Every reader must get in before any leaves
                    barrier.wait();
                    *guard
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(lock.reader_count(), 0);
    }

    #[test]
    fn test_rw_spin_lock_writer_blocks_new_readers() {
        let lock = Arc::new(RwSpinLock::new(0));

        let reader = lock.read();

        let lock_clone = Arc::clone(&lock);
        let writer = thread::spawn(move || {
            *lock_clone.write() = 7;
        });

        while !lock.is_write_locked() {
            thread::yield_now();
        }

        // A writer is queued behind the active reader; newcomers must wait
        assert!(lock.try_read().is_none());

        drop(reader);
        writer.join().unwrap();

        assert_eq!(*lock.read(), 7);
    }

    #[test]
    fn test_rw_spin_lock_exclusion() {
        let lock = Arc::new(RwSpinLock::new((0usize, 0usize)));
        let active_writers = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let active_writers = Arc::clone(&active_writers);
            let violations = Arc::clone(&violations);
            handles.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    let mut guard = lock.write();
                    if active_writers.fetch_add(1, Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    // Both halves move together; a reader must never see them differ
                    guard.0 += 1;
                    guard.1 += 1;
                    active_writers.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let active_writers = Arc::clone(&active_writers);
            let violations = Arc::clone(&violations);
            handles.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    let guard = lock.read();
                    if active_writers.load(Ordering::SeqCst) != 0 || guard.0 != guard.1 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(*lock.read(), (8_000, 8_000));
    }
}

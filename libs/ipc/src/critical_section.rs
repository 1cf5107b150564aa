// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::GuardNoSend;
use crate::fatal::fatal;
use crate::lazy_box::{LazyBox, LazyInit};
use crate::sys;

impl LazyInit for sys::RawCriticalSection {
    fn init() -> io::Result<Box<Self>> {
        Self::new().map(Box::new)
    }
}

/// A lock which can be recursively entered by a single thread, backed by the OS's recursive
/// lock (a recursive `pthread_mutex_t` or a Win32 `CRITICAL_SECTION`).
///
/// This type differs from [`Mutex`](crate::Mutex) in the following points:
///
/// - Entering multiple times from the same thread will work correctly instead of
///   deadlocking. The thread must leave exactly as many times as it entered.
/// - `CriticalSectionGuard` does not give mutable references to the locked data.
///   Use a `RefCell` if you need this.
/// - Ownership is tied to the entering thread, guards cannot be sent to another thread.
///
/// A critical section is also the lock a [`Condvar`](crate::Condvar) waits on.
pub struct CriticalSection<T: ?Sized> {
    lock: Lock,
    data: UnsafeCell<T>,
}

/// An RAII implementation of a "scoped lock" of a critical section. When this structure
/// is dropped (falls out of scope), the critical section is left once.
///
/// The data protected by the critical section can be accessed through this guard via its
/// `Deref` implementation.
#[clippy::has_significant_drop]
#[must_use = "if unused the CriticalSection will immediately be left"]
pub struct CriticalSectionGuard<'a, T: ?Sized> {
    cs: &'a CriticalSection<T>,
    marker: PhantomData<(&'a T, GuardNoSend)>,
}

/// The OS lock plus the bookkeeping we need on top of it: which thread owns the lock and how
/// often it entered. Both are only written by the owning thread while it holds the OS lock.
struct Lock {
    raw: LazyBox<sys::RawCriticalSection>,
    owner: AtomicUsize,
    count: Cell<usize>,
}

// Safety: `count` is only accessed by the thread that holds the OS lock
unsafe impl<T: ?Sized + Send> Send for CriticalSection<T> {}
// Safety: see above, and the guard only hands out shared references
unsafe impl<T: ?Sized + Send> Sync for CriticalSection<T> {}

impl<T> CriticalSection<T> {
    /// Creates a new critical section in the unlocked state.
    ///
    /// The OS lock is created when the critical section is first entered, and the process is
    /// aborted if that fails. Use [`CriticalSection::try_new`] to handle creation failure.
    #[inline]
    pub const fn new(val: T) -> Self {
        Self {
            lock: Lock {
                raw: LazyBox::new(),
                owner: AtomicUsize::new(0),
                count: Cell::new(0),
            },
            data: UnsafeCell::new(val),
        }
    }

    /// Creates a new critical section, creating the OS lock right away.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the lock cannot be created. The error code is also recorded in
    /// the [error context](crate::error).
    pub fn try_new(val: T) -> io::Result<Self> {
        let raw = sys::RawCriticalSection::init()?;
        Ok(Self {
            lock: Lock {
                raw: LazyBox::from_box(raw),
                owner: AtomicUsize::new(0),
                count: Cell::new(0),
            },
            data: UnsafeCell::new(val),
        })
    }

    /// Consumes this critical section, returning the underlying data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> CriticalSection<T> {
    /// Enters the critical section, blocking the current thread until it is able to do so.
    ///
    /// If the critical section is owned by another thread this function blocks until it is
    /// left. If the current thread already owns it, the recursion count is incremented and this
    /// returns immediately.
    pub fn enter(&self) -> CriticalSectionGuard<'_, T> {
        self.lock.raw.get().enter();
        self.lock.acquired();

        // Safety: we have just entered
        unsafe { self.make_guard_unchecked() }
    }

    /// Attempts to enter the critical section without blocking.
    ///
    /// Returns `None` if another thread owns it.
    pub fn try_enter(&self) -> Option<CriticalSectionGuard<'_, T>> {
        if self.lock.raw.get().try_enter() {
            self.lock.acquired();
            // Safety: we have just entered
            Some(unsafe { self.make_guard_unchecked() })
        } else {
            None
        }
    }

    /// Creates a `CriticalSectionGuard` without checking if the critical section is held.
    ///
    /// # Safety
    ///
    /// The current thread must have entered the critical section once for every guard that
    /// exists, the new one included.
    #[inline]
    pub unsafe fn make_guard_unchecked(&self) -> CriticalSectionGuard<'_, T> {
        CriticalSectionGuard {
            cs: self,
            marker: PhantomData,
        }
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `CriticalSection` mutably, no actual locking needs to
    /// take place.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Checks whether the critical section is currently owned by the current thread.
    ///
    /// Threads are told apart by the address of a thread-local, and the OS may hand that
    /// address to a new thread once the old one has exited. A thread that exits while it still
    /// owns the section (because it forgot its guard) can therefore make an unrelated later
    /// thread appear to be the owner.
    #[inline]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.lock.owner.load(Ordering::Relaxed) == current_thread_id()
    }

    /// Leaves the critical section once.
    ///
    /// Leaving a critical section the current thread does not own aborts the process. Ownership
    /// is checked as in [`is_owned_by_current_thread`](Self::is_owned_by_current_thread), so
    /// the check cannot catch a thread that inherited the identity of an exited owner.
    ///
    /// # Safety
    ///
    /// The current thread must logically own a `CriticalSectionGuard` that was discarded using
    /// `mem::forget`.
    pub unsafe fn force_leave(&self) {
        if !self.is_owned_by_current_thread() {
            fatal!("leaving a critical section the current thread does not own");
        }

        let count = self.lock.count.get() - 1;
        self.lock.count.set(count);
        if count == 0 {
            self.lock.owner.store(0, Ordering::Relaxed);
        }

        // Safety: we checked above that this thread owns the lock
        unsafe { self.lock.raw.get().leave() }
    }

    pub(crate) fn raw(&self) -> &sys::RawCriticalSection {
        self.lock.raw.get()
    }

    /// Clears the ownership record before a condition variable wait hands the OS lock away.
    pub(crate) fn suspend_ownership(&self) {
        if self.lock.count.get() != 1 {
            fatal!(
                count = self.lock.count.get(),
                "condition variable wait on a critical section that is not entered exactly once"
            );
        }
        self.lock.count.set(0);
        self.lock.owner.store(0, Ordering::Relaxed);
    }

    /// Restores the ownership record once a condition variable wait re-acquired the OS lock.
    pub(crate) fn resume_ownership(&self) {
        self.lock.acquired();
    }
}

impl Lock {
    /// Updates the bookkeeping right after the current thread entered the OS lock.
    fn acquired(&self) {
        let id = current_thread_id();
        if self.owner.load(Ordering::Relaxed) == id {
            let Some(count) = self.count.get().checked_add(1) else {
                fatal!("critical section recursion count overflow");
            };
            self.count.set(count);
        } else {
            self.owner.store(id, Ordering::Relaxed);
            self.count.set(1);
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if *self.owner.get_mut() != 0 {
            fatal!(
                count = self.count.get(),
                "destroying a critical section that is still entered"
            );
        }
        tracing::trace!("destroying critical section");
    }
}

impl<T: Default> Default for CriticalSection<T> {
    #[inline]
    fn default() -> CriticalSection<T> {
        CriticalSection::new(Default::default())
    }
}

impl<T> From<T> for CriticalSection<T> {
    #[inline]
    fn from(t: T) -> CriticalSection<T> {
        CriticalSection::new(t)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for CriticalSection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_enter() {
            Some(guard) => f
                .debug_struct("CriticalSection")
                .field("data", &&*guard)
                .finish(),
            None => {
                struct LockedPlaceholder;
                impl fmt::Debug for LockedPlaceholder {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("<locked>")
                    }
                }

                f.debug_struct("CriticalSection")
                    .field("data", &LockedPlaceholder)
                    .finish()
            }
        }
    }
}

// Safety: the guard only hands out shared references
unsafe impl<'a, T: ?Sized + Sync + 'a> Sync for CriticalSectionGuard<'a, T> {}

static_assertions::assert_impl_all!(CriticalSection<()>: Send, Sync);
static_assertions::assert_not_impl_any!(CriticalSectionGuard<'static, ()>: Send);

impl<'a, T: ?Sized + 'a> CriticalSectionGuard<'a, T> {
    /// Returns a reference to the original `CriticalSection` object.
    pub fn critical_section(s: &Self) -> &'a CriticalSection<T> {
        s.cs
    }
}

impl<'a, T: ?Sized + 'a> Deref for CriticalSectionGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // Safety: the guard always holds the lock, and only shared references are handed out
        unsafe { &*self.cs.data.get() }
    }
}

impl<'a, T: ?Sized + 'a> Drop for CriticalSectionGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // Safety: a guard always holds the lock
        unsafe {
            self.cs.force_leave();
        }
    }
}

impl<'a, T: fmt::Debug + ?Sized + 'a> fmt::Debug for CriticalSectionGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, T: fmt::Display + ?Sized + 'a> fmt::Display for CriticalSectionGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// A nonzero identifier of the current thread, the address of a thread-local.
fn current_thread_id() -> usize {
    thread_local! {
        static ID: u8 = const { 0 };
    }
    ID.with(|id| ptr::from_ref(id).addr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    use crate::test_util::fatal_test;

    #[test]
    fn reentrant() {
        let cs = CriticalSection::new(RefCell::new(0));
        let a = cs.enter();
        let b = cs.enter();
        let c = cs.try_enter().unwrap();
        *c.borrow_mut() += 1;
        assert!(cs.is_owned_by_current_thread());

        drop(c);
        drop(b);
        assert!(cs.is_owned_by_current_thread());
        drop(a);
        assert!(!cs.is_owned_by_current_thread());

        assert_eq!(*cs.enter().borrow(), 1);
    }

    #[test]
    fn try_enter_fails_while_other_thread_owns() {
        let cs = Arc::new(CriticalSection::try_new(()).unwrap());
        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));

        let holder = thread::spawn({
            let cs = cs.clone();
            let entered = entered.clone();
            let release = release.clone();
            move || {
                let _g = cs.enter();
                let _g2 = cs.enter();
                entered.store(true, Ordering::Release);
                while !release.load(Ordering::Acquire) {
                    thread::yield_now();
                }
            }
        });

        while !entered.load(Ordering::Acquire) {
            thread::yield_now();
        }
        assert!(cs.try_enter().is_none());
        assert!(!cs.is_owned_by_current_thread());

        release.store(true, Ordering::Release);
        holder.join().unwrap();

        // the holder left both of its entries
        assert!(cs.try_enter().is_some());
    }

    #[test]
    fn mutual_exclusion() {
        let cs = CriticalSection::new(Cell::new(0_usize));

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        let g = cs.enter();
                        let v = g.get();
                        thread::yield_now();
                        g.set(v + 1);
                    }
                });
            }
        });

        assert_eq!(cs.into_inner().get(), 4000);
    }

    #[test]
    fn blocked_enter_proceeds_after_leave() {
        let cs = CriticalSection::new(Cell::new(false));
        let g = cs.enter();

        thread::scope(|s| {
            let waiter = s.spawn(|| cs.enter().get());
            thread::sleep(Duration::from_millis(20));
            g.set(true);
            drop(g);
            assert!(waiter.join().unwrap());
        });
    }

    #[test]
    fn forgotten_guard_is_force_left() {
        let cs = CriticalSection::new(0);
        std::mem::forget(cs.enter());
        assert!(cs.is_owned_by_current_thread());

        // Safety: we forgot the guard above
        unsafe { cs.force_leave() };
        assert!(!cs.is_owned_by_current_thread());
    }

    #[test]
    fn get_mut_without_locking() {
        let mut cs = CriticalSection::from(vec![1, 2]);
        cs.get_mut().push(3);
        assert_eq!(*cs.enter(), [1, 2, 3]);
        assert_eq!(format!("{cs:?}"), "CriticalSection { data: [1, 2, 3] }");
    }

    fatal_test! {
        fn leaving_from_another_thread_aborts() {
            let cs = CriticalSection::new(());
            std::mem::forget(cs.enter());

            thread::scope(|s| {
                s.spawn(|| {
                    // Safety: deliberately violated, this must abort
                    unsafe { cs.force_leave() };
                });
            });
        }
    }

    fatal_test! {
        fn dropping_entered_section_aborts() {
            let cs = CriticalSection::new(());
            std::mem::forget(cs.enter());
            drop(cs);
        }
    }
}

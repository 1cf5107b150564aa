// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::critical_section::CriticalSectionGuard;
use crate::lazy_box::{LazyBox, LazyInit};
use crate::sys;

impl LazyInit for sys::Condvar {
    fn init() -> io::Result<Box<Self>> {
        Self::new().map(Box::new)
    }
}

/// A condition variable that waits on a [`CriticalSection`](crate::CriticalSection).
///
/// Waiting atomically leaves the critical section and suspends the calling thread. Before the
/// wait returns, the critical section is entered again. Waits may wake up spuriously, callers
/// must re-check their predicate (or use [`Condvar::wait_while`]).
///
/// The critical section must be entered exactly once by the waiting thread, waiting with a
/// recursively entered critical section aborts the process.
pub struct Condvar {
    inner: LazyBox<sys::Condvar>,
}

impl Condvar {
    /// Creates a new condition variable. The OS object is created on first use.
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: LazyBox::new(),
        }
    }

    /// Creates a new condition variable, creating the OS object right away.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the condition variable cannot be created.
    pub fn try_new() -> io::Result<Self> {
        Ok(Self {
            inner: LazyBox::from_box(sys::Condvar::init()?),
        })
    }

    /// Blocks the current thread until this condition variable receives a notification.
    pub fn wait<T: ?Sized>(&self, guard: &mut CriticalSectionGuard<'_, T>) {
        let cs = CriticalSectionGuard::critical_section(guard);

        cs.suspend_ownership();
        // Safety: `suspend_ownership` checked that we hold the lock exactly once
        unsafe { self.inner.get().wait(cs.raw()) };
        cs.resume_ownership();
    }

    /// Blocks the current thread until `condition` returns `false`, re-checking it after every
    /// wakeup.
    pub fn wait_while<T, F>(&self, guard: &mut CriticalSectionGuard<'_, T>, mut condition: F)
    where
        T: ?Sized,
        F: FnMut(&T) -> bool,
    {
        while condition(&**guard) {
            self.wait(guard);
        }
    }

    /// Blocks the current thread until this condition variable receives a notification or
    /// `timeout` elapsed.
    ///
    /// The critical section is held again when this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`io::ErrorKind::TimedOut`] if the timeout elapsed, or the OS
    /// error if the wait failed otherwise.
    pub fn wait_timeout<T: ?Sized>(
        &self,
        guard: &mut CriticalSectionGuard<'_, T>,
        timeout: Duration,
    ) -> io::Result<()> {
        let cs = CriticalSectionGuard::critical_section(guard);

        cs.suspend_ownership();
        // Safety: `suspend_ownership` checked that we hold the lock exactly once
        let res = unsafe { self.inner.get().wait_timeout(cs.raw(), timeout) };
        cs.resume_ownership();

        res
    }

    /// Wakes up one blocked thread, if any.
    #[inline]
    pub fn notify_one(&self) {
        if let Some(inner) = self.inner.get_if_init() {
            inner.notify_one();
        }
    }

    /// Wakes up all blocked threads.
    #[inline]
    pub fn notify_all(&self) {
        if let Some(inner) = self.inner.get_if_init() {
            inner.notify_all();
        }
    }
}

impl Default for Condvar {
    #[inline]
    fn default() -> Condvar {
        Condvar::new()
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CriticalSection;
    use std::cell::Cell;
    use std::thread;
    use std::time::Instant;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::util::SubscriberInitExt;

    use crate::test_util::fatal_test;

    #[test]
    fn notify_one_wakes_waiter() {
        let _trace = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_thread_ids(true)
            .set_default();

        let cs = CriticalSection::new(Cell::new(false));
        let cv = Condvar::new();

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                cs.enter().set(true);
                cv.notify_one();
            });

            let mut guard = cs.enter();
            cv.wait_while(&mut guard, |ready| !ready.get());
            assert!(guard.get());
            assert!(cs.is_owned_by_current_thread());
        });
    }

    #[test]
    fn notify_all_wakes_every_waiter() {
        let cs = CriticalSection::new(Cell::new(0_u32));
        let cv = Condvar::try_new().unwrap();
        let go = CriticalSection::new(Cell::new(false));

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut guard = go.enter();
                    cv.wait_while(&mut guard, |go| !go.get());
                    drop(guard);

                    let g = cs.enter();
                    g.set(g.get() + 1);
                });
            }

            thread::sleep(Duration::from_millis(20));
            go.enter().set(true);
            cv.notify_all();
        });

        assert_eq!(cs.into_inner().get(), 4);
    }

    #[test]
    fn wait_timeout_elapses_holding_the_lock() {
        let cs = CriticalSection::new(());
        let cv = Condvar::new();

        let mut guard = cs.enter();
        let start = Instant::now();
        let err = cv
            .wait_timeout(&mut guard, Duration::from_millis(50))
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(cs.is_owned_by_current_thread());
        assert_eq!(crate::error::last_error(), err.raw_os_error().unwrap());
    }

    #[test]
    fn notify_without_waiters_is_a_noop() {
        let cv = Condvar::default();
        cv.notify_one();
        cv.notify_all();
    }

    fatal_test! {
        fn waiting_on_recursively_entered_section_aborts() {
            let cs = CriticalSection::new(());
            let cv = Condvar::new();

            let _outer = cs.enter();
            let mut inner = cs.enter();
            cv.wait(&mut inner);
        }
    }
}

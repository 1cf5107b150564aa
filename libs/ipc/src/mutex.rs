// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use lock_api::GuardSend;

use crate::error::set_last_error;
use crate::fatal::fatal;
use crate::lazy_box::{LazyBox, LazyInit};
use crate::sys::{self, Event, EventKind};

/// A mutual exclusion lock that survives the death of the thread holding it.
///
/// Ownership isn't tracked per thread: the lock is a single token (an auto-reset event that
/// starts out signaled), and any thread may put the token back. A thread that exits while
/// holding the lock therefore doesn't wedge it, another thread can recover it with
/// [`Mutex::force_unlock`](lock_api::Mutex::force_unlock).
pub type Mutex<T> = lock_api::Mutex<RawMutex, T>;
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, RawMutex, T>;

pub struct RawMutex {
    inner: LazyBox<Token>,
}

struct Token {
    event: Event,
    locked: AtomicBool,
}

impl LazyInit for Token {
    fn init() -> io::Result<Box<Self>> {
        let event = Event::new(EventKind::AutoReset, true)?;
        tracing::trace!("created mutex");
        Ok(Box::new(Token {
            event,
            locked: AtomicBool::new(false),
        }))
    }
}

impl RawMutex {
    /// Creates a new, unlocked mutex, creating the OS object right away.
    ///
    /// [`RawMutex::INIT`](lock_api::RawMutex::INIT) defers creation to first use instead and
    /// aborts the process if that fails.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the underlying event cannot be created. The error code is also
    /// recorded in the [error context](crate::error).
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: LazyBox::from_box(Token::init()?),
        })
    }
}

// Safety: the token event grants the lock to exactly one thread at a time
unsafe impl lock_api::RawMutex for RawMutex {
    const INIT: Self = Self {
        inner: LazyBox::new(),
    };

    // the token is not tied to the locking thread
    type GuardMarker = GuardSend;

    fn lock(&self) {
        let token = self.inner.get();
        token.event.wait();
        token.locked.store(true, Ordering::Relaxed);
    }

    fn try_lock(&self) -> bool {
        let token = self.inner.get();
        if token.event.try_wait() {
            token.locked.store(true, Ordering::Relaxed);
            true
        } else {
            set_last_error(sys::EBUSY);
            false
        }
    }

    unsafe fn unlock(&self) {
        let token = self.inner.get();
        if !token.locked.swap(false, Ordering::Relaxed) {
            fatal!("unlocking a mutex that is not locked");
        }
        token.event.set();
    }

    fn is_locked(&self) -> bool {
        self.inner
            .get_if_init()
            .is_some_and(|token| token.locked.load(Ordering::Relaxed))
    }
}

impl Drop for RawMutex {
    fn drop(&mut self) {
        if lock_api::RawMutex::is_locked(self) {
            fatal!("destroying a mutex that is still locked");
        }
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &lock_api::RawMutex::is_locked(self))
            .finish_non_exhaustive()
    }
}

// guards may be released from another thread
static_assertions::assert_impl_all!(MutexGuard<'static, ()>: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use lock_api::RawMutex as _;
    use std::mem;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::test_util::fatal_test;

    #[test]
    fn try_lock_fails_while_locked() {
        let m = Mutex::from_raw(RawMutex::new().unwrap(), 0);

        let mut g = m.lock();
        *g += 1;
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());
        assert_eq!(crate::error::last_error(), sys::EBUSY);

        thread::scope(|s| {
            s.spawn(|| assert!(m.try_lock().is_none()));
        });

        drop(g);
        assert!(!m.is_locked());
        assert_eq!(*m.try_lock().unwrap(), 1);
    }

    #[test]
    fn mutual_exclusion() {
        let m = Arc::new(Mutex::new(0_usize));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut g = m.lock();
                        let v = *g;
                        thread::yield_now();
                        *g = v + 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*m.lock(), 4000);
    }

    #[test]
    fn abandoned_lock_can_be_recovered() {
        let m = Arc::new(Mutex::new(()));

        thread::spawn({
            let m = m.clone();
            move || mem::forget(m.lock())
        })
        .join()
        .unwrap();

        // the owner is gone, but the lock is still held
        assert!(m.is_locked());
        assert!(m.try_lock().is_none());

        // Safety: the guard was forgotten by the exited thread
        unsafe { m.force_unlock() };
        assert!(m.try_lock().is_some());
    }

    #[test]
    fn guard_can_be_released_from_another_thread() {
        let m = Mutex::new(5);
        let g = m.lock();

        thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(10));
                drop(g);
            });
            // blocks until the other thread dropped the guard
            assert_eq!(*m.lock(), 5);
        });
    }

    #[test]
    fn lazy_init_only_on_use() {
        let raw = RawMutex::INIT;
        assert!(!raw.is_locked());
        assert!(raw.inner.get_if_init().is_none());

        assert!(raw.try_lock());
        assert!(raw.inner.get_if_init().is_some());
        // Safety: locked above
        unsafe { raw.unlock() };
    }

    fatal_test! {
        fn unlocking_unheld_mutex_aborts() {
            let raw = RawMutex::new().unwrap();
            // Safety: deliberately violated, this must abort
            unsafe { raw.unlock() };
        }
    }

    fatal_test! {
        fn dropping_locked_mutex_aborts() {
            let raw = RawMutex::new().unwrap();
            raw.lock();
            drop(raw);
        }
    }
}

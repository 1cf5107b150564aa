// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::time::{Duration, Instant};

use super::condvar::Condvar;
use super::mutex::Mutex;
#[cfg(test)]
use crate::fatal::fatal;
use crate::sys::EventKind;

/// A binary signal in the style of a Win32 event object.
///
/// POSIX has no such object, so it is assembled from a plain mutex, a condition variable and the
/// signaled flag they guard. The flag is only ever read or written with `lock` held; the atomic
/// just spares us an `UnsafeCell`.
pub(crate) struct Event {
    lock: Mutex,
    cond: Condvar,
    signaled: AtomicBool,
    kind: EventKind,
}

impl Event {
    pub(crate) fn new(kind: EventKind, signaled: bool) -> io::Result<Self> {
        Ok(Self {
            lock: Mutex::new_normal()?,
            cond: Condvar::new()?,
            signaled: AtomicBool::new(signaled),
            kind,
        })
    }

    /// Blocks until the event is signaled, consuming the signal if this is an auto-reset event.
    pub(crate) fn wait(&self) {
        self.lock.enter();
        while !self.signaled.load(Ordering::Relaxed) {
            // Safety: we hold `lock` exactly once
            unsafe { self.cond.wait(&self.lock) }
        }
        self.consume();
        // Safety: we entered above
        unsafe { self.lock.leave() }
    }

    /// Blocks until the event is signaled or `timeout` elapsed. Returns `true` if the event was
    /// signaled.
    #[cfg(test)]
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);

        self.lock.enter();
        let signaled = loop {
            if self.signaled.load(Ordering::Relaxed) {
                self.consume();
                break true;
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                break false;
            }

            // Safety: we hold `lock` exactly once
            match unsafe { self.cond.wait_timeout(&self.lock, remaining) } {
                Ok(()) => {}
                Err(err) if err.raw_os_error() == Some(libc::ETIMEDOUT) => {}
                Err(err) => fatal!("pthread_cond_timedwait failed: {err}"),
            }
        };
        // Safety: we entered above
        unsafe { self.lock.leave() }

        signaled
    }

    /// Consumes the signal if it is set, without blocking on it.
    pub(crate) fn try_wait(&self) -> bool {
        self.lock.enter();
        let signaled = self.signaled.load(Ordering::Relaxed);
        if signaled {
            self.consume();
        }
        // Safety: we entered above
        unsafe { self.lock.leave() }
        signaled
    }

    pub(crate) fn set(&self) {
        self.lock.enter();
        self.signaled.store(true, Ordering::Relaxed);
        match self.kind {
            EventKind::ManualReset => self.cond.notify_all(),
            EventKind::AutoReset => self.cond.notify_one(),
        }
        // Safety: we entered above
        unsafe { self.lock.leave() }
    }

    pub(crate) fn reset(&self) {
        self.lock.enter();
        self.signaled.store(false, Ordering::Relaxed);
        // Safety: we entered above
        unsafe { self.lock.leave() }
    }

    fn consume(&self) {
        if self.kind == EventKind::AutoReset {
            self.signaled.store(false, Ordering::Relaxed);
        }
    }
}

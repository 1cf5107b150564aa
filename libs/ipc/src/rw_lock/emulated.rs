// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A writer-preferring reader-writer lock built from three binary events.
//!
//! - The **read gate** (manual-reset, initially open) admits new readers. A writer closes it as
//!   soon as it asks for the lock, so readers arriving after it queue up in front of the gate.
//! - The **write gate** (auto-reset, initially holding one permit) is the actual exclusive
//!   permit. A writer holds it for as long as it holds the lock, and the reader group as a
//!   whole holds it from the first reader in to the last reader out.
//! - The **wait gate** (auto-reset, initially holding one permit) serializes updates of the
//!   reader counter.
//!
//! Neither waiting writers nor waiting readers are served in FIFO order. Which of several
//! writers gets the write gate next is up to the OS, and so is the order in which queued
//! readers pass the read gate once it reopens.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use lock_api::GuardNoSend;

use crate::error::set_last_error;
use crate::fatal::fatal;
use crate::lazy_box::{LazyBox, LazyInit};
use crate::sys::{self, Event, EventKind};

struct Gates {
    read: Event,
    write: Event,
    wait: Event,
}

impl LazyInit for Gates {
    fn init() -> io::Result<Box<Self>> {
        let gates = Gates {
            read: Event::new(EventKind::ManualReset, true)?,
            write: Event::new(EventKind::AutoReset, true)?,
            wait: Event::new(EventKind::AutoReset, true)?,
        };
        tracing::trace!("created emulated rwlock");
        Ok(Box::new(gates))
    }
}

pub struct RawRwLock {
    gates: LazyBox<Gates>,
    exclusive: AtomicBool,
    /// Only modified while holding the wait gate.
    readers: AtomicUsize,
}

impl RawRwLock {
    /// Creates a new, unlocked lock, creating the OS objects right away.
    ///
    /// # Errors
    ///
    /// Returns the OS error if any of the gates cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            gates: LazyBox::from_box(Gates::init()?),
            exclusive: AtomicBool::new(false),
            readers: AtomicUsize::new(0),
        })
    }

    /// Registers one more reader. Must be called with the wait gate held.
    #[inline]
    fn enter_reader(&self, gates: &Gates, wait: fn(&Event) -> bool) -> bool {
        let readers = self.readers.load(Ordering::Relaxed);
        // the first reader in takes the write permit on behalf of all readers
        if readers == 0 && !wait(&gates.write) {
            return false;
        }
        self.readers.store(readers + 1, Ordering::Relaxed);
        true
    }
}

// Safety: the write gate permit is held either by one writer or by the group of readers
unsafe impl lock_api::RawRwLock for RawRwLock {
    const INIT: Self = Self {
        gates: LazyBox::new(),
        exclusive: AtomicBool::new(false),
        readers: AtomicUsize::new(0),
    };

    type GuardMarker = GuardNoSend;

    fn lock_shared(&self) {
        let gates = self.gates.get();

        tracing::trace!("waiting for read gate");
        gates.read.wait();
        gates.wait.wait();
        let entered = self.enter_reader(gates, |ev| {
            tracing::trace!("first reader, waiting for write gate");
            ev.wait();
            true
        });
        debug_assert!(entered);
        gates.wait.set();
    }

    fn try_lock_shared(&self) -> bool {
        let gates = self.gates.get();

        // The wait gate is held either for a counter update, which is over in a moment, or by a
        // reader queued on the write gate behind a writer. Only the latter is worth giving up for.
        loop {
            // the read gate is manual-reset, probing it doesn't close it
            if !gates.read.try_wait() || self.exclusive.load(Ordering::Relaxed) {
                set_last_error(sys::EBUSY);
                return false;
            }
            if gates.wait.try_wait() {
                break;
            }
            thread::yield_now();
        }

        let entered = self.enter_reader(gates, Event::try_wait);
        gates.wait.set();
        if !entered {
            set_last_error(sys::EBUSY);
        }
        entered
    }

    unsafe fn unlock_shared(&self) {
        let gates = self.gates.get();

        gates.wait.wait();
        let readers = self.readers.load(Ordering::Relaxed);
        if readers == 0 {
            fatal!("releasing a shared lock on a reader-writer lock without readers");
        }
        self.readers.store(readers - 1, Ordering::Relaxed);
        if readers == 1 {
            // last reader out hands the write permit back
            gates.write.set();
        }
        gates.wait.set();
    }

    fn lock_exclusive(&self) {
        let gates = self.gates.get();

        // close the gate first so readers arriving from now on queue behind us
        gates.read.reset();
        tracing::trace!("waiting for write gate");
        gates.write.wait();
        self.exclusive.store(true, Ordering::Relaxed);
    }

    fn try_lock_exclusive(&self) -> bool {
        let gates = self.gates.get();

        // take the permit before touching the read gate, a failed attempt must not reopen a
        // gate another writer closed
        if !gates.write.try_wait() {
            set_last_error(sys::EBUSY);
            return false;
        }
        gates.read.reset();
        self.exclusive.store(true, Ordering::Relaxed);
        true
    }

    unsafe fn unlock_exclusive(&self) {
        let gates = self.gates.get();

        if !self.exclusive.swap(false, Ordering::Relaxed) {
            fatal!("releasing an exclusive lock on a reader-writer lock that is not write-locked");
        }
        gates.write.set();
        gates.read.set();
    }

    fn is_locked(&self) -> bool {
        self.exclusive.load(Ordering::Relaxed) || self.readers.load(Ordering::Relaxed) > 0
    }

    fn is_locked_exclusive(&self) -> bool {
        self.exclusive.load(Ordering::Relaxed)
    }
}

impl Drop for RawRwLock {
    fn drop(&mut self) {
        if lock_api::RawRwLock::is_locked(self) {
            fatal!("destroying a reader-writer lock that is still locked");
        }
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock")
            .field("exclusive", &self.exclusive.load(Ordering::Relaxed))
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

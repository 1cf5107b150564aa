// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Portable synchronization and lightweight IPC primitives.
//!
//! Every primitive in this crate is a thin layer over what the host OS provides: POSIX threads
//! on Unix and kernel objects on Windows. The one exception is the reader-writer lock, which
//! falls back to an emulation built from three binary events on platforms that don't offer a
//! writer-preferring lock natively (see [`RawRwLock`]).
//!
//! # Failure model
//!
//! Creating an OS object can fail, and those failures are reported as [`std::io::Error`]s. The
//! raw OS code is also recorded in the calling thread's [error context](error). Misusing a
//! primitive (unlocking a lock that isn't held, destroying a lock that is) is a bug and
//! terminates the process: continuing past a corrupted lock state is never safe.

mod condvar;
mod critical_section;
pub mod error;
mod fatal;
mod lazy_box;
mod mutex;
mod once;
mod pipe;
mod rw_lock;
mod semaphore;
pub mod signal;
mod sys;
#[cfg(test)]
mod test_util;

pub use condvar::Condvar;
pub use critical_section::{CriticalSection, CriticalSectionGuard};
pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use once::InitOnce;
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use rw_lock::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use semaphore::{MAX_INITIAL_VALUE, Semaphore};

/// Marker type which indicates that the Guard type for a lock is not `Send`.
#[expect(dead_code, reason = "inner pointer is unused")]
pub(crate) struct GuardNoSend(*mut ());
// Safety: the marker carries no data, it only opts guards out of `Send`
unsafe impl Sync for GuardNoSend {}

// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Platform backends.
//!
//! Both backends export the same set of items so the portable layer never has to branch on the
//! host OS:
//!
//! - `RawCriticalSection`: recursive OS lock
//! - `Condvar`: condition variable that waits on a `RawCriticalSection`
//! - `Event`: binary signal with manual- or auto-reset semantics
//! - `Semaphore`: named counting semaphore handle
//! - `PipeEnd` and `pipe()`: anonymous byte pipe
//! - `Once`: native one-time initialization gate
//! - `signal::register`: signal disposition installation
//! - `EINVAL`, `EBUSY`: platform codes recorded for errors the crate detects itself

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub(crate) use unix::*;
    } else if #[cfg(windows)] {
        mod windows;
        pub(crate) use windows::*;
    } else {
        compile_error!("syslib-ipc only supports unix and windows targets");
    }
}

/// How an [`Event`] behaves after a waiter has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    /// The event stays signaled until it is explicitly reset, releasing every waiter.
    ManualReset,
    /// The event resets itself when it releases a single waiter.
    AutoReset,
}

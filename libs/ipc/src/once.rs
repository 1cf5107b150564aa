// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::sys;

/// A gate that runs an initializer exactly once, backed by `pthread_once` or
/// `InitOnceExecuteOnce`.
///
/// Every caller, including ones that arrive while another thread is still running the
/// initializer, returns only after the initializer completed and observes its effects.
///
/// # Examples
///
/// ```
/// use syslib_ipc::InitOnce;
///
/// static INIT: InitOnce = InitOnce::new();
///
/// INIT.call(|| println!("runs once")).unwrap();
/// INIT.call(|| unreachable!()).unwrap();
/// assert!(INIT.is_completed());
/// ```
pub struct InitOnce {
    inner: sys::Once,
    done: AtomicBool,
}

impl InitOnce {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: sys::Once::new(),
            done: AtomicBool::new(false),
        }
    }

    /// Runs `f` if no call on this gate has completed yet, otherwise drops it.
    ///
    /// Panicking in `f` aborts the process, the unwind cannot pass through the OS.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the OS rejected the call. The initializer did not run then.
    pub fn call<F: FnOnce()>(&self, f: F) -> io::Result<()> {
        if self.is_completed() {
            return Ok(());
        }

        let mut f = Some(f);
        self.inner.call(&mut || {
            if let Some(f) = f.take() {
                f();
            }
            self.done.store(true, Ordering::Release);
        })
    }

    /// Returns `true` once an initializer has run to completion.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl Default for InitOnce {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InitOnce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOnce")
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

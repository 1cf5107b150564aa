// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Signal handler registration.
//!
//! On POSIX systems handlers are installed with `sigaction`, with `SA_RESTART` set so that
//! system calls interrupted by the handler are restarted rather than failing with `EINTR`, and
//! with every other signal blocked while the handler runs. On Windows the C runtime's `signal`
//! is used.

#[cfg(unix)]
use std::fmt;
use std::io;
use std::mem;

use libc::c_int;

use crate::sys;

/// What happens when a signal is delivered.
#[derive(Debug, Clone, Copy)]
pub enum SigHandler {
    /// The platform's default action.
    Default,
    /// The signal is discarded.
    Ignore,
    /// The function is called with the signal number.
    Handler(extern "C" fn(c_int)),
    /// A disposition installed by someone else that none of the other variants can describe,
    /// such as a `SA_SIGINFO` handler. Registering it again restores it exactly as it was.
    #[cfg(unix)]
    Native(NativeDisposition),
}

/// An opaque, complete signal disposition as reported by the OS.
#[cfg(unix)]
#[derive(Clone, Copy)]
pub struct NativeDisposition(pub(crate) sys::signal::Disposition);

#[cfg(unix)]
impl fmt::Debug for NativeDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl SigHandler {
    pub(crate) fn into_raw(self) -> libc::sighandler_t {
        match self {
            SigHandler::Default => libc::SIG_DFL,
            SigHandler::Ignore => libc::SIG_IGN,
            SigHandler::Handler(f) => f as libc::sighandler_t,
            #[cfg(unix)]
            SigHandler::Native(native) => native.0.handler(),
        }
    }

    /// # Safety
    ///
    /// `raw` must be `SIG_DFL`, `SIG_IGN` or the address of a function with the signature of
    /// [`SigHandler::Handler`].
    pub(crate) unsafe fn from_raw(raw: libc::sighandler_t) -> Self {
        match raw {
            libc::SIG_DFL => SigHandler::Default,
            libc::SIG_IGN => SigHandler::Ignore,
            // Safety: ensured by the caller
            f => SigHandler::Handler(unsafe {
                mem::transmute::<libc::sighandler_t, extern "C" fn(c_int)>(f)
            }),
        }
    }
}

/// Installs `handler` as the disposition for `signo` and returns the previous one.
///
/// # Safety
///
/// The handler runs asynchronously on whatever thread the signal is delivered to, interrupting
/// that thread at an arbitrary point. It must only call async-signal-safe functions and must not
/// touch state the interrupted code might hold locks on.
///
/// # Errors
///
/// Returns the OS error if `signo` is not a valid signal number or its disposition cannot be
/// changed (such as `SIGKILL`).
pub unsafe fn register(signo: c_int, handler: SigHandler) -> io::Result<SigHandler> {
    // Safety: ensured by the caller
    let prev = unsafe { sys::signal::register(signo, handler)? };
    tracing::trace!(signo, ?handler, ?prev, "registered signal handler");
    Ok(prev)
}

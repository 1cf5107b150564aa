// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::mem;
#[cfg(test)]
use std::ptr;

use crate::error::last_os_error;
use crate::signal::{NativeDisposition, SigHandler};

/// Flags that change how a handler is called. A disposition carrying any of them can't be
/// described by a plain [`SigHandler::Handler`].
const CALL_FLAGS: libc::c_int =
    libc::SA_SIGINFO | libc::SA_ONSTACK | libc::SA_RESETHAND | libc::SA_NODEFER;

/// A complete `sigaction` record.
#[derive(Clone, Copy)]
pub(crate) struct Disposition(libc::sigaction);

impl Disposition {
    pub(crate) fn handler(&self) -> libc::sighandler_t {
        self.0.sa_sigaction
    }
}

impl fmt::Debug for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposition")
            .field("handler", &format_args!("{:#x}", self.0.sa_sigaction))
            .field("flags", &format_args!("{:#x}", self.0.sa_flags))
            .finish_non_exhaustive()
    }
}

/// Installs `handler` for `signo` with `SA_RESTART` and every other signal blocked while the
/// handler runs. A [`SigHandler::Native`] disposition is installed verbatim instead.
///
/// # Safety
///
/// See [`crate::signal::register`].
pub(crate) unsafe fn register(signo: libc::c_int, handler: SigHandler) -> io::Result<SigHandler> {
    let act = match handler {
        SigHandler::Native(NativeDisposition(Disposition(act))) => act,
        handler => {
            // Safety: all-zeroes is a valid `sigaction`, every field we rely on is set below
            let mut act: libc::sigaction = unsafe { mem::zeroed() };
            act.sa_sigaction = handler.into_raw();
            act.sa_flags = libc::SA_RESTART;
            // Safety: `sa_mask` is a valid, owned signal set
            unsafe { libc::sigfillset(&raw mut act.sa_mask) };
            act
        }
    };

    // Safety: see above
    let mut old: libc::sigaction = unsafe { mem::zeroed() };
    // Safety: both pointers are valid for the duration of the call
    if unsafe { libc::sigaction(signo, &raw const act, &raw mut old) } < 0 {
        return Err(last_os_error());
    }

    Ok(match old.sa_sigaction {
        libc::SIG_DFL => SigHandler::Default,
        libc::SIG_IGN => SigHandler::Ignore,
        _ if old.sa_flags & CALL_FLAGS != 0 => {
            SigHandler::Native(NativeDisposition(Disposition(old)))
        }
        // Safety: no `SA_SIGINFO`, so this is a one-argument handler
        raw => unsafe { SigHandler::from_raw(raw) },
    })
}

/// Returns the flags of the currently installed disposition for `signo`.
#[cfg(test)]
pub(crate) fn installed_flags(signo: libc::c_int) -> io::Result<libc::c_int> {
    // Safety: all-zeroes is a valid `sigaction`
    let mut cur: libc::sigaction = unsafe { mem::zeroed() };
    // Safety: a null `act` only queries the disposition
    if unsafe { libc::sigaction(signo, ptr::null(), &raw mut cur) } < 0 {
        return Err(last_os_error());
    }
    Ok(cur.sa_flags)
}

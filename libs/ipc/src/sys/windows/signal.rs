// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use crate::error::invalid_input;
use crate::signal::SigHandler;

#[allow(
    clippy::cast_sign_loss,
    clippy::unnecessary_cast,
    reason = "the CRT reports failure as the all-ones handler value"
)]
const SIG_ERR: libc::sighandler_t = libc::SIG_ERR as libc::sighandler_t;

/// Installs `handler` for `signo` through the C runtime.
///
/// # Safety
///
/// See [`crate::signal::register`].
pub(crate) unsafe fn register(signo: libc::c_int, handler: SigHandler) -> io::Result<SigHandler> {
    // Safety: the caller upholds the handler contract
    let prev = unsafe { libc::signal(signo, handler.into_raw()) };
    if prev == SIG_ERR {
        // the CRT only rejects signal numbers it doesn't know
        return Err(invalid_input("unsupported signal number"));
    }

    // Safety: the CRT only hands back dispositions that were installed as handlers
    Ok(unsafe { SigHandler::from_raw(prev) })
}

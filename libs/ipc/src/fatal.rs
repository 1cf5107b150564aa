// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Terminates the current process in an abnormal fashion. This function will never return.
///
/// This is the only way the crate reacts to a broken lock invariant. Unlike a panic it cannot be
/// caught, so no code ever observes a primitive whose internal state is known to be corrupt.
///
/// # Breakpoint support
///
/// This function is never inlined, so a breakpoint on `syslib_ipc::fatal::abort` catches the
/// process just before it exits.
#[cold]
#[inline(never)]
pub(crate) fn abort() -> ! {
    std::process::abort();
}

/// Logs the violated invariant and [`abort`]s the process.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        tracing::error!($($arg)+);
        $crate::fatal::abort()
    }};
}
pub(crate) use fatal;

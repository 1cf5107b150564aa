// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Win32 backend.

mod condvar;
mod critical_section;
mod event;
mod once;
mod pipe;
mod semaphore;
pub(crate) mod signal;

use std::io;
use std::panic::Location;
use std::time::Duration;

use windows_sys::Win32::Foundation::{BOOL, ERROR_BUSY, ERROR_INVALID_PARAMETER};
use windows_sys::Win32::System::Threading::INFINITE;

use crate::error::last_os_error;
use crate::fatal::fatal;

pub(crate) use condvar::Condvar;
pub(crate) use critical_section::RawCriticalSection;
pub(crate) use event::Event;
pub(crate) use once::Once;
pub(crate) use pipe::{PipeEnd, pipe};
pub(crate) use semaphore::Semaphore;

#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
pub(crate) const EINVAL: i32 = ERROR_INVALID_PARAMETER as i32;
#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
pub(crate) const EBUSY: i32 = ERROR_BUSY as i32;

/// Converts a Win32 `BOOL` result into a `Result`, capturing `GetLastError` on failure.
#[inline]
pub(crate) fn cvt(res: BOOL) -> io::Result<()> {
    if res == 0 { Err(last_os_error()) } else { Ok(()) }
}

/// Asserts that a Win32 call that can only fail through misuse succeeded.
#[inline]
#[track_caller]
pub(crate) fn check(res: BOOL, op: &'static str) {
    if res == 0 {
        fatal!(
            location = %Location::caller(),
            "{op} failed: {}",
            io::Error::last_os_error()
        );
    }
}

/// Converts a timeout into the milliseconds Win32 waits expect.
///
/// Rounds up so a wait never returns before `dur` elapsed, and saturates just below `INFINITE`
/// so a huge timeout doesn't silently turn into an unbounded wait.
pub(crate) fn dur_to_ms(dur: Duration) -> u32 {
    let mut ms = dur.as_millis();
    if dur.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    u32::try_from(ms).map_or(INFINITE - 1, |ms| ms.min(INFINITE - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::is_fatal_child;
    use tracing_subscriber::util::SubscriberInitExt;

    #[test]
    fn failed_check_reports_caller() {
        if is_fatal_child() {
            let _trace = tracing_subscriber::fmt().with_ansi(false).set_default();
            check(0, "SetEvent");
        } else {
            let printed = crate::test_util::assert_child_aborts(concat!(
                module_path!(),
                "::failed_check_reports_caller"
            ));
            assert!(printed.contains("SetEvent failed"), "{printed}");
            assert!(printed.contains(&format!("location={}:", file!())), "{printed}");
        }
    }

    #[test]
    fn timeouts_round_up_and_saturate() {
        assert_eq!(dur_to_ms(Duration::ZERO), 0);
        assert_eq!(dur_to_ms(Duration::from_millis(50)), 50);
        assert_eq!(dur_to_ms(Duration::from_micros(1)), 1);
        assert_eq!(dur_to_ms(Duration::from_micros(1500)), 2);
        assert_eq!(dur_to_ms(Duration::MAX), INFINITE - 1);
    }
}

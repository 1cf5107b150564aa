// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! POSIX threads backend.

mod condvar;
mod event;
mod mutex;
mod once;
mod pipe;
#[cfg(all(
    target_os = "linux",
    target_env = "gnu",
    any(test, not(feature = "emulated-rwlock"))
))]
mod rwlock;
mod semaphore;
pub(crate) mod signal;

use std::io;
use std::panic::Location;

use crate::error::os_error;
use crate::fatal::fatal;

pub(crate) use condvar::Condvar;
pub(crate) use event::Event;
pub(crate) use mutex::Mutex as RawCriticalSection;
pub(crate) use once::Once;
pub(crate) use pipe::{PipeEnd, pipe};
#[cfg(all(
    target_os = "linux",
    target_env = "gnu",
    any(test, not(feature = "emulated-rwlock"))
))]
pub(crate) use rwlock::RwLock;
pub(crate) use semaphore::Semaphore;

pub(crate) const EINVAL: i32 = libc::EINVAL;
pub(crate) const EBUSY: i32 = libc::EBUSY;

/// Converts the return value of a pthread function (0 or an error number) into a `Result`,
/// recording failures in the error context.
#[inline]
pub(crate) fn cvt_nz(res: libc::c_int) -> io::Result<()> {
    if res == 0 { Ok(()) } else { Err(os_error(res)) }
}

/// Converts the return value of a libc function that reports failure as `-1` + `errno`.
#[inline]
pub(crate) fn cvt(res: libc::c_int) -> io::Result<libc::c_int> {
    if res == -1 {
        Err(crate::error::last_os_error())
    } else {
        Ok(res)
    }
}

/// Asserts that a pthread call that can only fail through misuse succeeded.
#[inline]
#[track_caller]
pub(crate) fn check(res: libc::c_int, op: &'static str) {
    if res != 0 {
        fatal!(
            location = %Location::caller(),
            "{op} failed: {}",
            io::Error::from_raw_os_error(res)
        );
    }
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
            check(libc::EINVAL, "pthread_mutex_lock");
        } else {
            let printed = crate::test_util::assert_child_aborts(concat!(
                module_path!(),
                "::failed_check_reports_caller"
            ));
            assert!(printed.contains("pthread_mutex_lock failed"), "{printed}");
            assert!(printed.contains(&format!("location={}:", file!())), "{printed}");
        }
    }
}

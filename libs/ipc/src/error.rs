// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-thread error context.
//!
//! Every failing operation in this crate records the raw OS error code of the failure here
//! before it returns. The context is the platform's own per-thread slot (`errno` on Unix,
//! `GetLastError` on Windows), so it is **thread-local**: a failure on one thread is never
//! visible from another.
//!
//! Rust callers will usually just inspect the returned [`io::Error`]; the context exists for code
//! that only gets a success/failure answer (`try_*` methods return `bool`/`Option`) and wants to
//! know why.

use std::io;

/// Returns the calling thread's last recorded error code.
#[inline]
#[must_use]
pub fn last_error() -> i32 {
    errno::errno().0
}

/// Overwrites the calling thread's last recorded error code.
#[inline]
pub fn set_last_error(code: i32) {
    errno::set_errno(errno::Errno(code));
}

/// Writes a human-readable description of `code` into `buf` and returns the written part.
///
/// The text is truncated to fit `buf`, always on a character boundary, so the returned string
/// is valid UTF-8 even when it had to be cut short. An empty buffer yields an empty string.
pub fn error_text(code: i32, buf: &mut [u8]) -> &str {
    let msg = errno::Errno(code).to_string();

    let mut end = msg.len().min(buf.len());
    while !msg.is_char_boundary(end) {
        end -= 1;
    }

    buf[..end].copy_from_slice(&msg.as_bytes()[..end]);
    std::str::from_utf8(&buf[..end]).unwrap_or_default()
}

/// Records `code` in the error context and converts it into an [`io::Error`].
pub(crate) fn os_error(code: i32) -> io::Error {
    tracing::debug!(code, "os error");
    set_last_error(code);
    io::Error::from_raw_os_error(code)
}

/// Captures the error the last OS call left in the error context.
pub(crate) fn last_os_error() -> io::Error {
    let err = io::Error::last_os_error();
    tracing::debug!(%err, "os error");
    // logging may have clobbered the slot
    if let Some(code) = err.raw_os_error() {
        set_last_error(code);
    }
    err
}

/// Rejects an argument before it reaches the OS, recording the platform's "invalid argument"
/// code in the error context.
pub(crate) fn invalid_input(msg: &'static str) -> io::Error {
    set_last_error(crate::sys::EINVAL);
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_and_get_round_trip() {
        set_last_error(crate::sys::EINVAL);
        assert_eq!(last_error(), crate::sys::EINVAL);

        set_last_error(0);
        assert_eq!(last_error(), 0);
    }

    #[test]
    fn context_is_thread_local() {
        set_last_error(1234);

        let other = thread::spawn(last_error).join().unwrap();
        assert_ne!(other, 1234);

        // our own value survived the other thread's activity
        assert_eq!(last_error(), 1234);
    }

    #[test]
    fn text_fits_buffer() {
        let mut buf = [0u8; 256];
        let text = error_text(crate::sys::EINVAL, &mut buf);
        assert!(!text.is_empty());

        let mut small = [0u8; 4];
        let short = error_text(crate::sys::EINVAL, &mut small);
        assert!(short.len() <= 4);
        assert!(text.starts_with(short));
    }

    #[test]
    fn text_into_empty_buffer() {
        assert_eq!(error_text(crate::sys::EINVAL, &mut []), "");
    }

    #[test]
    fn os_error_records_code() {
        let err = os_error(crate::sys::EINVAL);
        assert_eq!(err.raw_os_error(), Some(crate::sys::EINVAL));
        assert_eq!(last_error(), crate::sys::EINVAL);
    }
}

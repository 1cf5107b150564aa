// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::CString;
use std::fmt;
use std::io;

use crate::error::invalid_input;
use crate::sys;

/// The largest initial value a semaphore can be created with on every supported platform.
pub const MAX_INITIAL_VALUE: u16 = 32767;

/// A named counting semaphore, visible to every process on the machine.
///
/// The name is a key in an OS-global namespace. On POSIX systems it should start with a `/` and
/// contain no further slashes. Removing the name with [`Semaphore::unlink`] stops future
/// [`Semaphore::open`] calls from finding the semaphore but leaves existing handles working.
pub struct Semaphore {
    name: String,
    inner: sys::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore called `name` with a count of `initial`.
    ///
    /// # Errors
    ///
    /// - [`io::ErrorKind::AlreadyExists`] if a semaphore of that name exists already.
    /// - [`io::ErrorKind::InvalidInput`] if `initial` exceeds [`MAX_INITIAL_VALUE`] or `name`
    ///   contains a NUL byte.
    /// - Any other OS error creating the semaphore.
    pub fn create(name: &str, initial: u16) -> io::Result<Self> {
        if initial > MAX_INITIAL_VALUE {
            return Err(invalid_input("initial semaphore value exceeds 32767"));
        }
        let c_name = c_name(name)?;

        let inner = sys::Semaphore::create(&c_name, u32::from(initial))?;
        tracing::trace!(name, initial, "created semaphore");
        Ok(Self {
            name: name.to_owned(),
            inner,
        })
    }

    /// Opens the existing semaphore called `name`.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::NotFound`] if there is no such semaphore, or any other OS error.
    pub fn open(name: &str) -> io::Result<Self> {
        let inner = sys::Semaphore::open(&c_name(name)?)?;
        tracing::trace!(name, "opened semaphore");
        Ok(Self {
            name: name.to_owned(),
            inner,
        })
    }

    /// Removes `name` from the OS namespace.
    ///
    /// Handles that are already open stay valid. On Windows the name is tied to the lifetime of
    /// the open handles instead, and this does nothing.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::NotFound`] if there is no such semaphore, or any other OS error.
    pub fn unlink(name: &str) -> io::Result<()> {
        sys::Semaphore::unlink(&c_name(name)?)?;
        tracing::trace!(name, "unlinked semaphore");
        Ok(())
    }

    /// Decrements the count if it is positive, without blocking.
    ///
    /// Returns `false` if the count was zero.
    #[inline]
    pub fn try_wait(&self) -> bool {
        self.inner.try_wait()
    }

    /// Decrements the count, blocking while it is zero.
    #[inline]
    pub fn wait(&self) {
        self.inner.wait();
    }

    /// Increments the count, waking one blocked waiter if there is any.
    #[inline]
    pub fn post(&self) {
        self.inner.post();
    }

    /// Closes this handle. Same as dropping it.
    #[inline]
    pub fn close(self) {
        drop(self);
    }

    /// The name this handle was created or opened with.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| invalid_input("semaphore name contains a NUL byte"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use crate::error::{last_error, set_last_error};

    /// What a failed `try_wait` leaves in the error context.
    #[cfg(unix)]
    const EMPTY: i32 = libc::EAGAIN;
    #[cfg(windows)]
    const EMPTY: i32 = windows_sys::Win32::Foundation::ERROR_TIMEOUT.cast_signed();

    /// A name no other test (or concurrently running test binary) uses. Kept short, macOS
    /// limits semaphore names to 31 bytes.
    fn unique_name() -> String {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        format!(
            "/ipct{}_{}",
            process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        )
    }

    /// Unlinks the name when the test ends, also when it fails.
    struct Unlink(String);

    impl Drop for Unlink {
        fn drop(&mut self) {
            let _ = Semaphore::unlink(&self.0);
        }
    }

    #[test]
    fn counts() {
        let name = unique_name();
        let _unlink = Unlink(name.clone());

        let sem = Semaphore::create(&name, 3).unwrap();
        assert_eq!(sem.name(), name);

        for _ in 0..3 {
            assert!(sem.try_wait());
        }
        assert!(!sem.try_wait());

        for _ in 0..3 {
            sem.post();
        }
        for _ in 0..3 {
            assert!(sem.try_wait());
        }
        set_last_error(0);
        assert!(!sem.try_wait());
        assert_eq!(last_error(), EMPTY);
        sem.close();
    }

    #[test]
    fn create_fails_if_name_exists() {
        let name = unique_name();
        let _unlink = Unlink(name.clone());

        let _sem = Semaphore::create(&name, 0).unwrap();
        let err = Semaphore::create(&name, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(last_error(), err.raw_os_error().unwrap());
    }

    #[test]
    fn rejects_invalid_arguments() {
        let err = Semaphore::create(&unique_name(), MAX_INITIAL_VALUE + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(last_error(), sys::EINVAL);

        let err = Semaphore::create("/ipc\0test", 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = Semaphore::open("/ipc\0test").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn open_shares_the_count() {
        let name = unique_name();
        let _unlink = Unlink(name.clone());

        let a = Semaphore::create(&name, 1).unwrap();
        let b = Semaphore::open(&name).unwrap();

        assert!(b.try_wait());
        assert!(!a.try_wait());
        a.post();
        assert!(b.try_wait());
    }

    #[test]
    fn wait_blocks_until_post() {
        let name = unique_name();
        let _unlink = Unlink(name.clone());
        let sem = Semaphore::create(&name, 0).unwrap();

        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(20));
                sem.post();
            });
            sem.wait();
        });
        assert!(!sem.try_wait());
    }

    #[cfg(unix)]
    #[test]
    fn unlink_keeps_open_handles_valid() {
        let name = unique_name();
        let sem = Semaphore::create(&name, 1).unwrap();

        Semaphore::unlink(&name).unwrap();
        assert_eq!(
            Semaphore::open(&name).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );

        // the handle still works
        assert!(sem.try_wait());
        sem.post();
        assert!(sem.try_wait());

        // and the name is free again
        let _again = Semaphore::create(&name, 0).unwrap();
        Semaphore::unlink(&name).unwrap();
    }
}

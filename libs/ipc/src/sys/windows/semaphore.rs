// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::CStr;
use std::io;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::ptr;

use windows_sys::Win32::Foundation::{
    ERROR_ALREADY_EXISTS, ERROR_TIMEOUT, GetLastError, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Threading::{
    CreateSemaphoreA, INFINITE, OpenSemaphoreA, ReleaseSemaphore, SEMAPHORE_ALL_ACCESS,
    WaitForSingleObject,
};

use super::check;
use crate::error::{last_os_error, os_error, set_last_error};
use crate::fatal::fatal;

/// The largest count a Win32 semaphore is created with.
const MAX_COUNT: i32 = 0x7fff_ffff;

#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
const EEXIST: i32 = ERROR_ALREADY_EXISTS as i32;

#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
const ETIMEDOUT: i32 = ERROR_TIMEOUT as i32;

/// A handle to a named Win32 semaphore.
pub(crate) struct Semaphore {
    handle: OwnedHandle,
}

impl Semaphore {
    /// Creates a new named semaphore, failing with `ERROR_ALREADY_EXISTS` if the name is taken.
    pub(crate) fn create(name: &CStr, value: u32) -> io::Result<Self> {
        let initial = i32::try_from(value).unwrap_or(MAX_COUNT);
        // Safety: `name` is a valid C string, no security attributes
        let handle =
            unsafe { CreateSemaphoreA(ptr::null(), initial, MAX_COUNT, name.as_ptr().cast()) };
        // must be read before anything else can touch the thread's last error
        // Safety: always safe to call
        let existed = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;

        let this = Self::from_raw(handle)?;
        if existed {
            drop(this);
            return Err(os_error(EEXIST));
        }
        Ok(this)
    }

    /// Opens an existing named semaphore.
    pub(crate) fn open(name: &CStr) -> io::Result<Self> {
        // Safety: `name` is a valid C string
        let handle = unsafe { OpenSemaphoreA(SEMAPHORE_ALL_ACCESS, 0, name.as_ptr().cast()) };
        Self::from_raw(handle)
    }

    fn from_raw(handle: HANDLE) -> io::Result<Self> {
        if handle.is_null() {
            return Err(last_os_error());
        }
        // Safety: the handle was just returned to us and is owned by nobody else
        let handle = unsafe { OwnedHandle::from_raw_handle(handle) };
        Ok(Self { handle })
    }

    pub(crate) fn try_wait(&self) -> bool {
        // Safety: the handle is an open semaphore
        match unsafe { WaitForSingleObject(self.handle.as_raw_handle(), 0) } {
            WAIT_OBJECT_0 => true,
            WAIT_TIMEOUT => {
                set_last_error(ETIMEDOUT);
                false
            }
            _ => fatal!("WaitForSingleObject failed: {}", io::Error::last_os_error()),
        }
    }

    pub(crate) fn wait(&self) {
        // Safety: the handle is an open semaphore
        match unsafe { WaitForSingleObject(self.handle.as_raw_handle(), INFINITE) } {
            WAIT_OBJECT_0 => {}
            _ => fatal!("WaitForSingleObject failed: {}", io::Error::last_os_error()),
        }
    }

    pub(crate) fn post(&self) {
        // Safety: the handle is an open semaphore
        check(
            unsafe { ReleaseSemaphore(self.handle.as_raw_handle(), 1, ptr::null_mut()) },
            "ReleaseSemaphore",
        );
    }

    /// Win32 semaphores have no persistent name, they vanish with their last handle.
    #[allow(
        clippy::unnecessary_wraps,
        reason = "unlinking is fallible on the POSIX backend"
    )]
    pub(crate) fn unlink(_name: &CStr) -> io::Result<()> {
        Ok(())
    }
}

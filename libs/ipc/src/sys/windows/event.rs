// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::ptr;

use windows_sys::Win32::Foundation::{WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows_sys::Win32::System::Threading::{
    CreateEventW, INFINITE, ResetEvent, SetEvent, WaitForSingleObject,
};

use super::check;
use crate::error::last_os_error;
use crate::fatal::fatal;
use crate::sys::EventKind;

/// An unnamed Win32 event object.
pub(crate) struct Event {
    handle: OwnedHandle,
}

impl Event {
    pub(crate) fn new(kind: EventKind, signaled: bool) -> io::Result<Self> {
        let manual = i32::from(kind == EventKind::ManualReset);
        // Safety: no security attributes and no name, the handle is owned by us
        let handle = unsafe { CreateEventW(ptr::null(), manual, i32::from(signaled), ptr::null()) };
        if handle.is_null() {
            return Err(last_os_error());
        }

        // Safety: `CreateEventW` returned a fresh handle nobody else owns
        let handle = unsafe { OwnedHandle::from_raw_handle(handle) };
        Ok(Self { handle })
    }

    pub(crate) fn wait(&self) {
        // Safety: the handle is an open event
        match unsafe { WaitForSingleObject(self.handle.as_raw_handle(), INFINITE) } {
            WAIT_OBJECT_0 => {}
            _ => fatal!("WaitForSingleObject failed: {}", io::Error::last_os_error()),
        }
    }

    pub(crate) fn try_wait(&self) -> bool {
        // Safety: the handle is an open event
        match unsafe { WaitForSingleObject(self.handle.as_raw_handle(), 0) } {
            WAIT_OBJECT_0 => true,
            WAIT_TIMEOUT => false,
            _ => fatal!("WaitForSingleObject failed: {}", io::Error::last_os_error()),
        }
    }

    pub(crate) fn set(&self) {
        // Safety: the handle is an open event
        check(unsafe { SetEvent(self.handle.as_raw_handle()) }, "SetEvent");
    }

    pub(crate) fn reset(&self) {
        // Safety: the handle is an open event
        check(unsafe { ResetEvent(self.handle.as_raw_handle()) }, "ResetEvent");
    }
}

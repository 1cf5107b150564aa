// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::UnsafeCell;
use std::io;
use std::mem;

use windows_sys::Win32::System::Threading::{
    CRITICAL_SECTION, DeleteCriticalSection, EnterCriticalSection, InitializeCriticalSection,
    LeaveCriticalSection, TryEnterCriticalSection,
};

use crate::error::set_last_error;

/// A heap-pinned Win32 `CRITICAL_SECTION`. Critical sections are recursive.
pub(crate) struct RawCriticalSection {
    inner: Box<UnsafeCell<CRITICAL_SECTION>>,
}

// Safety: critical sections are designed to be shared between threads
unsafe impl Send for RawCriticalSection {}
// Safety: critical sections are designed to be shared between threads
unsafe impl Sync for RawCriticalSection {}

impl RawCriticalSection {
    #[allow(
        clippy::unnecessary_wraps,
        reason = "creation is fallible on the pthread backend"
    )]
    pub(crate) fn new() -> io::Result<Self> {
        // Safety: all-zeroes is a valid placeholder, it is initialized right below
        let inner = Box::new(UnsafeCell::new(unsafe { mem::zeroed::<CRITICAL_SECTION>() }));
        // Safety: `inner` is heap-pinned and initialized exactly once
        unsafe { InitializeCriticalSection(inner.get()) };
        tracing::trace!("created critical section");
        Ok(Self { inner })
    }

    #[inline]
    pub(crate) fn raw(&self) -> *mut CRITICAL_SECTION {
        self.inner.get()
    }

    #[inline]
    pub(crate) fn enter(&self) {
        // Safety: initialized in `new`
        unsafe { EnterCriticalSection(self.raw()) }
    }

    #[inline]
    pub(crate) fn try_enter(&self) -> bool {
        // Safety: initialized in `new`
        if unsafe { TryEnterCriticalSection(self.raw()) } == 0 {
            set_last_error(super::EBUSY);
            false
        } else {
            true
        }
    }

    /// # Safety
    ///
    /// The calling thread must own the critical section.
    #[inline]
    pub(crate) unsafe fn leave(&self) {
        // Safety: initialized in `new`, owned by the caller
        unsafe { LeaveCriticalSection(self.raw()) }
    }
}

impl Drop for RawCriticalSection {
    fn drop(&mut self) {
        // Safety: we have exclusive access
        unsafe { DeleteCriticalSection(self.raw()) }
    }
}

// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::UnsafeCell;
use std::io;
use std::time::Duration;

use windows_sys::Win32::System::Threading::{
    CONDITION_VARIABLE, CONDITION_VARIABLE_INIT, INFINITE, SleepConditionVariableCS,
    WakeAllConditionVariable, WakeConditionVariable,
};

use super::critical_section::RawCriticalSection;
use super::{check, cvt, dur_to_ms};

pub(crate) struct Condvar {
    inner: Box<UnsafeCell<CONDITION_VARIABLE>>,
}

// Safety: condition variables are designed to be shared between threads
unsafe impl Send for Condvar {}
// Safety: condition variables are designed to be shared between threads
unsafe impl Sync for Condvar {}

impl Condvar {
    #[allow(
        clippy::unnecessary_wraps,
        reason = "creation is fallible on the pthread backend"
    )]
    pub(crate) fn new() -> io::Result<Self> {
        Ok(Self {
            inner: Box::new(UnsafeCell::new(CONDITION_VARIABLE_INIT)),
        })
    }

    /// # Safety
    ///
    /// The calling thread must own `cs` exactly once.
    pub(crate) unsafe fn wait(&self, cs: &RawCriticalSection) {
        // Safety: both objects are initialized, the caller owns `cs`
        check(
            unsafe { SleepConditionVariableCS(self.inner.get(), cs.raw(), INFINITE) },
            "SleepConditionVariableCS",
        );
    }

    /// Waits for a notification or until `timeout` elapsed. A timeout is reported as an
    /// `ERROR_TIMEOUT` error.
    ///
    /// # Safety
    ///
    /// The calling thread must own `cs` exactly once.
    pub(crate) unsafe fn wait_timeout(
        &self,
        cs: &RawCriticalSection,
        timeout: Duration,
    ) -> io::Result<()> {
        // Safety: both objects are initialized, the caller owns `cs`
        cvt(unsafe { SleepConditionVariableCS(self.inner.get(), cs.raw(), dur_to_ms(timeout)) })
    }

    pub(crate) fn notify_one(&self) {
        // Safety: the condvar is initialized
        unsafe { WakeConditionVariable(self.inner.get()) }
    }

    pub(crate) fn notify_all(&self) {
        // Safety: the condvar is initialized
        unsafe { WakeAllConditionVariable(self.inner.get()) }
    }
}

// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::io;
use std::ptr;

use windows_sys::Win32::Foundation::{BOOL, TRUE};
use windows_sys::Win32::System::Threading::{INIT_ONCE, INIT_ONCE_STATIC_INIT, InitOnceExecuteOnce};

use super::cvt;

unsafe extern "system" fn trampoline(
    _once: *mut INIT_ONCE,
    param: *mut c_void,
    _ctx: *mut *mut c_void,
) -> BOOL {
    // Safety: `Once::call` passes a pointer to its closure reference, which stays alive and
    // unaliased for the duration of the `InitOnceExecuteOnce` call that invokes us
    let f = unsafe { &mut *param.cast::<&mut dyn FnMut()>() };
    f();
    TRUE
}

pub(crate) struct Once {
    inner: UnsafeCell<INIT_ONCE>,
}

// Safety: `INIT_ONCE` is designed to be shared between threads
unsafe impl Send for Once {}
// Safety: `INIT_ONCE` is designed to be shared between threads
unsafe impl Sync for Once {}

impl Once {
    pub(crate) const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(INIT_ONCE_STATIC_INIT),
        }
    }

    /// Runs `f` if no call on this gate has completed yet, blocking while another thread runs
    /// its initializer.
    ///
    /// A panic in `f` cannot unwind through `InitOnceExecuteOnce` and aborts the process.
    pub(crate) fn call(&self, mut f: &mut dyn FnMut()) -> io::Result<()> {
        let param = (&raw mut f).cast::<c_void>().cast_const();
        // Safety: `inner` is a valid one-time initialization structure, `param` outlives the call
        cvt(unsafe {
            InitOnceExecuteOnce(self.inner.get(), Some(trampoline), param, ptr::null_mut())
        })
    }
}

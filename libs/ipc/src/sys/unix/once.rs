// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::{Cell, UnsafeCell};
use std::ffi::c_void;
use std::io;
use std::ptr;

use super::cvt_nz;

thread_local! {
    /// The initializer `pthread_once` should run on this thread. `pthread_once` takes a bare
    /// function without a context pointer, so the closure travels through TLS instead.
    static PENDING: Cell<*mut c_void> = const { Cell::new(ptr::null_mut()) };
}

extern "C" fn trampoline() {
    let f = PENDING.get().cast::<&mut dyn FnMut()>();
    // Safety: `Once::call` keeps the closure alive and unaliased for the duration of the
    // `pthread_once` call that invokes us
    if let Some(f) = unsafe { f.as_mut() } {
        f();
    }
}

pub(crate) struct Once {
    inner: UnsafeCell<libc::pthread_once_t>,
}

// Safety: `pthread_once_t` is designed to be shared between threads
unsafe impl Send for Once {}
// Safety: `pthread_once_t` is designed to be shared between threads
unsafe impl Sync for Once {}

impl Once {
    pub(crate) const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(libc::PTHREAD_ONCE_INIT),
        }
    }

    /// Runs `f` if no call on this gate has completed yet, blocking while another thread runs
    /// its initializer.
    ///
    /// A panic in `f` cannot unwind through `pthread_once` and aborts the process.
    pub(crate) fn call(&self, mut f: &mut dyn FnMut()) -> io::Result<()> {
        // the pointer is taken out of TLS again before `f` goes out of scope. An initializer may
        // itself run another `Once`, so whatever was pending before is restored.
        let prev = PENDING.replace((&raw mut f).cast());
        // Safety: `inner` is a valid once control
        let res = unsafe { libc::pthread_once(self.inner.get(), trampoline) };
        PENDING.set(prev);

        cvt_nz(res)
    }
}

// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::fatal::fatal;

/// An OS object that can be created on demand.
pub(crate) trait LazyInit: Sized {
    fn init() -> io::Result<Box<Self>>;
}

/// A heap-pinned OS object that is created either eagerly (through [`LazyBox::from_box`]) or on
/// first access.
///
/// Most OS synchronization objects must never move once initialized, and none of them can be
/// created in a `const` context, yet `lock_api` requires locks to have a `const INIT` value. This
/// type squares the two: the `const` value is an empty box that allocates on first use.
///
/// Creating the object lazily has no caller to report failure to, so a failed lazy creation
/// aborts the process. Callers that need to handle creation failure create eagerly instead.
pub(crate) struct LazyBox<T: LazyInit> {
    ptr: AtomicPtr<T>,
    _marker: PhantomData<T>,
}

impl<T: LazyInit> LazyBox<T> {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn from_box(value: Box<T>) -> Self {
        Self {
            ptr: AtomicPtr::new(Box::into_raw(value)),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> &T {
        let ptr = self.ptr.load(Ordering::Acquire);
        if ptr.is_null() {
            self.initialize()
        } else {
            // Safety: non-null pointers stored in `ptr` come from `Box::into_raw` and are only
            // freed in `drop`
            unsafe { &*ptr }
        }
    }

    /// Returns the object if it has been created already.
    #[inline]
    pub(crate) fn get_if_init(&self) -> Option<&T> {
        let ptr = self.ptr.load(Ordering::Acquire);
        // Safety: see `get`
        unsafe { ptr.as_ref() }
    }

    #[cold]
    fn initialize(&self) -> &T {
        let new = match T::init() {
            Ok(value) => Box::into_raw(value),
            Err(err) => fatal!("failed to lazily create OS synchronization object: {err}"),
        };

        match self
            .ptr
            .compare_exchange(ptr::null_mut(), new, Ordering::AcqRel, Ordering::Acquire)
        {
            // Safety: we just stored `new`, which came from `Box::into_raw`
            Ok(_) => unsafe { &*new },
            Err(existing) => {
                // Another thread raced us. Its object wins and ours was never shared, so
                // it can go.
                // Safety: `new` came from `Box::into_raw` and was never published
                drop(unsafe { Box::from_raw(new) });
                // Safety: `existing` is non-null and came from `Box::into_raw`
                unsafe { &*existing }
            }
        }
    }
}

impl<T: LazyInit> Drop for LazyBox<T> {
    fn drop(&mut self) {
        let ptr = *self.ptr.get_mut();
        if !ptr.is_null() {
            // Safety: we have exclusive access and the pointer came from `Box::into_raw`
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

impl<T: LazyInit> fmt::Debug for LazyBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBox")
            .field("initialized", &!self.ptr.load(Ordering::Relaxed).is_null())
            .finish_non_exhaustive()
    }
}

// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::ptr;

use super::cvt;

/// One end of an anonymous pipe. The descriptor is closed on drop.
#[derive(Debug)]
pub(crate) struct PipeEnd(OwnedFd);

pub(crate) fn pipe() -> io::Result<(PipeEnd, PipeEnd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    // Safety: `fds` has room for the two descriptors
    cvt(unsafe { libc::pipe(fds.as_mut_ptr()) })?;

    // Safety: `pipe` succeeded, both descriptors are open and owned by nobody else
    let (r, w) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((PipeEnd(r), PipeEnd(w)))
}

impl PipeEnd {
    pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let mut val = libc::c_int::from(nonblocking);
        // Safety: FIONBIO takes a pointer to an int
        cvt(unsafe { libc::ioctl(self.0.as_raw_fd(), libc::FIONBIO, ptr::from_mut(&mut val)) })?;
        Ok(())
    }

    pub(crate) fn readable_bytes(&self) -> io::Result<usize> {
        let mut bytes: libc::c_int = 0;
        // Safety: FIONREAD takes a pointer to an int
        cvt(unsafe {
            libc::ioctl(
                self.0.as_raw_fd(),
                libc::FIONREAD,
                ptr::from_mut(&mut bytes),
            )
        })?;
        Ok(usize::try_from(bytes).unwrap_or(0))
    }

    pub(crate) fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        // Safety: `buf` is valid for `buf.len()` bytes of writes
        let n = unsafe { libc::read(self.0.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
        usize::try_from(n).map_err(|_| crate::error::last_os_error())
    }

    pub(crate) fn write(&self, buf: &[u8]) -> io::Result<usize> {
        // Safety: `buf` is valid for `buf.len()` bytes of reads
        let n = unsafe { libc::write(self.0.as_raw_fd(), buf.as_ptr().cast(), buf.len()) };
        usize::try_from(n).map_err(|_| crate::error::last_os_error())
    }
}

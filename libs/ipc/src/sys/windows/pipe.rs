// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::ptr;

use windows_sys::Win32::Foundation::{ERROR_BROKEN_PIPE, ERROR_NO_DATA, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows_sys::Win32::System::Pipes::{
    CreatePipe, PIPE_NOWAIT, PIPE_READMODE_BYTE, PIPE_WAIT, PeekNamedPipe,
    SetNamedPipeHandleState,
};

use super::cvt;
use crate::error::{last_os_error, set_last_error};

#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
const NO_DATA: i32 = ERROR_NO_DATA as i32;
#[allow(clippy::cast_possible_wrap, reason = "Win32 error codes are small")]
const BROKEN_PIPE: i32 = ERROR_BROKEN_PIPE as i32;

/// One end of an anonymous pipe. The handle is closed on drop.
#[derive(Debug)]
pub(crate) struct PipeEnd(OwnedHandle);

pub(crate) fn pipe() -> io::Result<(PipeEnd, PipeEnd)> {
    let mut r: HANDLE = ptr::null_mut();
    let mut w: HANDLE = ptr::null_mut();
    // Safety: both out-pointers are valid, default security and buffer size
    cvt(unsafe { CreatePipe(&raw mut r, &raw mut w, ptr::null(), 0) })?;

    // Safety: `CreatePipe` succeeded, both handles are fresh and owned by nobody else
    let (r, w) = unsafe { (OwnedHandle::from_raw_handle(r), OwnedHandle::from_raw_handle(w)) };
    Ok((PipeEnd(r), PipeEnd(w)))
}

impl PipeEnd {
    pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        let mode = PIPE_READMODE_BYTE | if nonblocking { PIPE_NOWAIT } else { PIPE_WAIT };
        // Safety: the handle is an open pipe, `mode` outlives the call
        cvt(unsafe {
            SetNamedPipeHandleState(
                self.0.as_raw_handle(),
                &raw const mode,
                ptr::null(),
                ptr::null(),
            )
        })
    }

    pub(crate) fn readable_bytes(&self) -> io::Result<usize> {
        let mut avail: u32 = 0;
        // Safety: the handle is an open pipe, only the total is queried
        cvt(unsafe {
            PeekNamedPipe(
                self.0.as_raw_handle(),
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                &raw mut avail,
                ptr::null_mut(),
            )
        })?;
        Ok(avail as usize)
    }

    pub(crate) fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let mut read: u32 = 0;
        // Safety: `buf` is valid for `len` bytes of writes, the pipe is not overlapped
        let res = unsafe {
            ReadFile(
                self.0.as_raw_handle(),
                buf.as_mut_ptr(),
                len,
                &raw mut read,
                ptr::null_mut(),
            )
        };

        match cvt(res) {
            Ok(()) => Ok(read as usize),
            // an empty pipe in non-blocking mode
            Err(err) if err.raw_os_error() == Some(NO_DATA) => {
                set_last_error(NO_DATA);
                Err(io::ErrorKind::WouldBlock.into())
            }
            // the write end is gone
            Err(err) if err.raw_os_error() == Some(BROKEN_PIPE) => Ok(0),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let mut written: u32 = 0;
        // Safety: `buf` is valid for `len` bytes of reads, the pipe is not overlapped
        let res = unsafe {
            WriteFile(
                self.0.as_raw_handle(),
                buf.as_ptr(),
                len,
                &raw mut written,
                ptr::null_mut(),
            )
        };
        if res == 0 {
            return Err(last_os_error());
        }
        Ok(written as usize)
    }
}

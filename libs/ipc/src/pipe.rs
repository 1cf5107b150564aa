// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;

use crate::sys;

/// Creates an anonymous pipe, returning its read and write ends.
///
/// Bytes written to the [`PipeWriter`] are read from the [`PipeReader`] in the order they were
/// written. Both ends start out blocking and are closed when dropped.
///
/// # Errors
///
/// Returns the OS error if the pipe cannot be created.
pub fn pipe() -> io::Result<(PipeReader, PipeWriter)> {
    let (r, w) = sys::pipe()?;
    tracing::trace!(reader = ?r, writer = ?w, "created pipe");
    Ok((PipeReader(r), PipeWriter(w)))
}

/// The read end of a pipe created by [`pipe`].
#[derive(Debug)]
pub struct PipeReader(sys::PipeEnd);

/// The write end of a pipe created by [`pipe`].
#[derive(Debug)]
pub struct PipeWriter(sys::PipeEnd);

impl PipeReader {
    /// Switches the end between blocking and non-blocking mode.
    ///
    /// In non-blocking mode a read with no data pending fails with
    /// [`io::ErrorKind::WouldBlock`] instead of waiting for data.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mode cannot be changed.
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }

    /// Returns the number of bytes that can be read without blocking.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the pipe cannot be queried.
    pub fn readable_bytes(&self) -> io::Result<usize> {
        self.0.readable_bytes()
    }
}

impl PipeWriter {
    /// Switches the end between blocking and non-blocking mode.
    ///
    /// In non-blocking mode a write to a full pipe fails with [`io::ErrorKind::WouldBlock`]
    /// instead of waiting for space.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mode cannot be changed.
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.0.set_nonblocking(nonblocking)
    }
}

impl io::Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl io::Read for &PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

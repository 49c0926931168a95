// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-pipe backend.
//!
//! Each increment is one 8-byte write, which `PIPE_BUF` keeps atomic. Drain
//! reads until the pipe is empty and sums the queued values.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

const VALUE_SIZE: usize = std::mem::size_of::<u64>();
const DRAIN_CHUNK: usize = VALUE_SIZE * 64;

pub(super) fn create() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [RawFd; 2] = [-1; 2];
    // SAFETY: fds is a valid two-element array for pipe(2) to fill.
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: both descriptors were just returned by pipe and are unowned.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

    for fd in [read.as_raw_fd(), write.as_raw_fd()] {
        set_nonblocking_cloexec(fd)?;
    }
    Ok((read, write))
}

fn set_nonblocking_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own, with standard commands.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

pub(super) fn write_value(fd: BorrowedFd<'_>, value: u64) -> io::Result<()> {
    let payload = value.to_ne_bytes();
    loop {
        // SAFETY: payload is an 8-byte stack buffer.
        let ret = unsafe { libc::write(fd.as_raw_fd(), payload.as_ptr().cast(), payload.len()) };
        if ret >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => continue,
            // Pipe full: the read end is already readable.
            io::ErrorKind::WouldBlock => {
                log::debug!("[notify] self-pipe full, dropping +{}", value);
                return Ok(());
            }
            _ => return Err(err),
        }
    }
}

pub(super) fn drain(fd: BorrowedFd<'_>) -> io::Result<u64> {
    let mut buf = [0u8; DRAIN_CHUNK];
    let mut pending = 0usize;
    let mut total: u64 = 0;

    loop {
        // SAFETY: the destination slice lies inside buf.
        let ret = unsafe {
            libc::read(
                fd.as_raw_fd(),
                buf[pending..].as_mut_ptr().cast(),
                DRAIN_CHUNK - pending,
            )
        };
        if ret == 0 {
            break;
        }
        if ret < 0 {
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => break,
                _ => return Err(err),
            }
        }

        let filled = pending + ret as usize;
        let whole = filled - filled % VALUE_SIZE;
        for chunk in buf[..whole].chunks_exact(VALUE_SIZE) {
            let mut raw = [0u8; VALUE_SIZE];
            raw.copy_from_slice(chunk);
            total = total.wrapping_add(u64::from_ne_bytes(raw));
        }
        buf.copy_within(whole..filled, 0);
        pending = filled - whole;
    }

    if pending != 0 {
        log::debug!("[notify] self-pipe drained with {} stray bytes", pending);
    }
    Ok(total)
}

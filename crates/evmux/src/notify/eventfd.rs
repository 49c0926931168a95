// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! eventfd backend (Linux).

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

const EVENTFD_FLAGS: libc::c_int = libc::EFD_NONBLOCK | libc::EFD_CLOEXEC;

pub(super) fn create() -> io::Result<OwnedFd> {
    // SAFETY: eventfd is invoked with valid flags and no shared state.
    let fd = unsafe { libc::eventfd(0, EVENTFD_FLAGS) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd was just returned by eventfd and is owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub(super) fn write_value(fd: BorrowedFd<'_>, value: u64) -> io::Result<()> {
    let payload = value.to_ne_bytes();
    loop {
        // SAFETY: payload references a stack buffer with the 8-byte eventfd payload.
        let ret = unsafe { libc::write(fd.as_raw_fd(), payload.as_ptr().cast(), payload.len()) };
        if ret >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => continue,
            // Counter saturated: the channel is already readable.
            io::ErrorKind::WouldBlock => {
                log::debug!("[notify] eventfd counter saturated, dropping +{}", value);
                return Ok(());
            }
            _ => return Err(err),
        }
    }
}

pub(super) fn read_counter(fd: BorrowedFd<'_>) -> io::Result<u64> {
    let mut payload = [0u8; 8];
    loop {
        // SAFETY: payload is a stack buffer sized to the eventfd read requirements (8 bytes).
        let ret = unsafe { libc::read(fd.as_raw_fd(), payload.as_mut_ptr().cast(), payload.len()) };
        if ret >= 0 {
            return Ok(u64::from_ne_bytes(payload));
        }

        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => continue,
            io::ErrorKind::WouldBlock => return Ok(0),
            _ => return Err(err),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Counting notification channels.
//!
//! A [`NotifyChannel`] is a 64-bit accumulator shared between one writer
//! thread and one reader thread. Writers call [`NotifyChannel::increment`],
//! which makes the channel readable; the reader observes readiness through
//! `poll(2)` and resets the accumulator with [`NotifyChannel::drain`].
//!
//! - On Linux the default backend is an eventfd (kernel-side counter).
//! - On every Unix a self-pipe backend is available; each increment writes
//!   one 8-byte value and drain sums whatever is queued.
//!
//! Several increments between two waits coalesce into a single readiness
//! event. Only readiness is meaningful, the drained count may race with
//! concurrent increments.

#[cfg(target_os = "linux")]
mod eventfd;
mod pipe;

use crate::error::{Error, Result};
use std::fmt;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::str::FromStr;

/// Largest value a single increment may add (the eventfd counter ceiling).
pub const MAX_INCREMENT: u64 = u64::MAX - 1;

/// Identifies one of the two channels watched by the multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    /// Both identifiers in inspection order.
    pub const ALL: [ChannelId; 2] = [ChannelId::A, ChannelId::B];

    /// Position of the channel in the poll set.
    pub fn index(self) -> usize {
        match self {
            ChannelId::A => 0,
            ChannelId::B => 1,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::A => write!(f, "A"),
            ChannelId::B => write!(f, "B"),
        }
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(ChannelId::A),
            "b" => Ok(ChannelId::B),
            other => Err(format!("unknown channel '{}' (expected a or b)", other)),
        }
    }
}

/// Kernel object backing a [`NotifyChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `eventfd(2)`, Linux only.
    Eventfd,
    /// Non-blocking pipe carrying 8-byte native-endian values.
    SelfPipe,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            Backend::Eventfd
        } else {
            Backend::SelfPipe
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Eventfd => write!(f, "eventfd"),
            Backend::SelfPipe => write!(f, "pipe"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eventfd" => Ok(Backend::Eventfd),
            "pipe" | "self-pipe" | "selfpipe" => Ok(Backend::SelfPipe),
            other => Err(format!(
                "unknown backend '{}' (expected eventfd or pipe)",
                other
            )),
        }
    }
}

enum Handle {
    #[cfg(target_os = "linux")]
    Eventfd(OwnedFd),
    Pipe { read: OwnedFd, write: OwnedFd },
}

/// Counting, cross-thread readiness signal.
///
/// Descriptors are closed when the channel is dropped.
pub struct NotifyChannel {
    handle: Handle,
}

impl NotifyChannel {
    /// Create a channel on the platform default backend.
    pub fn new() -> Result<Self> {
        Self::with_backend(Backend::default())
    }

    /// Create a channel on an explicit backend.
    ///
    /// Requesting [`Backend::Eventfd`] outside Linux fails with
    /// `ErrorKind::Unsupported`.
    pub fn with_backend(backend: Backend) -> Result<Self> {
        let handle = match backend {
            #[cfg(target_os = "linux")]
            Backend::Eventfd => Handle::Eventfd(eventfd::create().map_err(Error::ChannelCreate)?),
            #[cfg(not(target_os = "linux"))]
            Backend::Eventfd => {
                return Err(Error::ChannelCreate(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "eventfd is only available on Linux",
                )))
            }
            Backend::SelfPipe => {
                let (read, write) = pipe::create().map_err(Error::ChannelCreate)?;
                Handle::Pipe { read, write }
            }
        };

        let channel = Self { handle };
        log::debug!(
            "[notify] created {} channel fd={}",
            channel.backend(),
            channel.as_raw_fd()
        );
        Ok(channel)
    }

    /// Backend this channel was created on.
    pub fn backend(&self) -> Backend {
        match self.handle {
            #[cfg(target_os = "linux")]
            Handle::Eventfd(_) => Backend::Eventfd,
            Handle::Pipe { .. } => Backend::SelfPipe,
        }
    }

    /// Add `value` to the accumulator and make the channel ready.
    ///
    /// `value` must lie in `1..=MAX_INCREMENT` on every backend. Zero would
    /// leave an eventfd unreadable but make a pipe readable; `u64::MAX` is
    /// refused by eventfd with `EINVAL`.
    pub fn increment(&self, value: u64) -> Result<()> {
        if value == 0 || value > MAX_INCREMENT {
            return Err(Error::ChannelWrite(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("increment must be in 1..={}", MAX_INCREMENT),
            )));
        }

        let res = match &self.handle {
            #[cfg(target_os = "linux")]
            Handle::Eventfd(fd) => eventfd::write_value(fd.as_fd(), value),
            Handle::Pipe { write, .. } => pipe::write_value(write.as_fd(), value),
        };
        res.map_err(Error::ChannelWrite)
    }

    /// Read and reset the accumulator. Returns 0 if nothing was pending.
    pub fn drain(&self) -> Result<u64> {
        let res = match &self.handle {
            #[cfg(target_os = "linux")]
            Handle::Eventfd(fd) => eventfd::read_counter(fd.as_fd()),
            Handle::Pipe { read, .. } => pipe::drain(read.as_fd()),
        };
        res.map_err(Error::ChannelRead)
    }

    /// Non-blocking readiness probe.
    pub fn is_ready(&self) -> bool {
        crate::poll::readable_now(self.as_fd())
    }
}

impl AsFd for NotifyChannel {
    /// Descriptor the waiter polls for `POLLIN`.
    fn as_fd(&self) -> BorrowedFd<'_> {
        match &self.handle {
            #[cfg(target_os = "linux")]
            Handle::Eventfd(fd) => fd.as_fd(),
            Handle::Pipe { read, .. } => read.as_fd(),
        }
    }
}

impl AsRawFd for NotifyChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.as_fd().as_raw_fd()
    }
}

impl fmt::Debug for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyChannel")
            .field("backend", &self.backend())
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends() -> Vec<Backend> {
        let mut all = vec![Backend::SelfPipe];
        if cfg!(target_os = "linux") {
            all.push(Backend::Eventfd);
        }
        all
    }

    #[test]
    fn fresh_channel_is_not_ready() {
        for backend in backends() {
            let ch = NotifyChannel::with_backend(backend).expect("channel");
            assert!(!ch.is_ready(), "{} should start empty", backend);
            assert_eq!(ch.drain().expect("drain"), 0);
        }
    }

    #[test]
    fn increments_accumulate_until_drained() {
        for backend in backends() {
            let ch = NotifyChannel::with_backend(backend).expect("channel");
            ch.increment(2).expect("inc");
            ch.increment(2).expect("inc");
            ch.increment(5).expect("inc");
            assert!(ch.is_ready());

            assert_eq!(ch.drain().expect("drain"), 9, "{}", backend);
            assert!(!ch.is_ready());
        }
    }

    #[test]
    fn zero_increment_rejected() {
        let ch = NotifyChannel::new().expect("channel");
        assert!(matches!(ch.increment(0), Err(Error::ChannelWrite(_))));
        assert!(!ch.is_ready());
    }

    #[test]
    fn out_of_range_increment_rejected_on_every_backend() {
        for backend in backends() {
            let ch = NotifyChannel::with_backend(backend).expect("channel");
            assert!(
                matches!(ch.increment(u64::MAX), Err(Error::ChannelWrite(_))),
                "{}",
                backend
            );
            assert!(!ch.is_ready(), "{} must stay empty", backend);

            ch.increment(MAX_INCREMENT).expect("ceiling value");
            assert_eq!(ch.drain().expect("drain"), MAX_INCREMENT);
        }
    }

    #[test]
    fn increment_from_other_thread_is_visible() {
        let ch = NotifyChannel::new().expect("channel");
        std::thread::scope(|s| {
            s.spawn(|| ch.increment(3).expect("inc"));
        });
        assert!(ch.is_ready());
        assert_eq!(ch.drain().expect("drain"), 3);
    }

    #[test]
    fn parse_ids_and_backends() {
        assert_eq!("a".parse::<ChannelId>(), Ok(ChannelId::A));
        assert_eq!("B".parse::<ChannelId>(), Ok(ChannelId::B));
        assert!("c".parse::<ChannelId>().is_err());
        assert_eq!("pipe".parse::<Backend>(), Ok(Backend::SelfPipe));
        assert_eq!("EVENTFD".parse::<Backend>(), Ok(Backend::Eventfd));
        assert!("epoll".parse::<Backend>().is_err());
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn eventfd_unsupported_off_linux() {
        assert!(matches!(
            NotifyChannel::with_backend(Backend::Eventfd),
            Err(Error::ChannelCreate(_))
        ));
    }
}

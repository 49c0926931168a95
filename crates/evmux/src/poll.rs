// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded wait over a pair of notification channels.
//!
//! [`poll_pair`] performs one `poll(2)` call over both channels and reports a
//! tagged [`WaitOutcome`]: timeout and failure are distinct variants.

use crate::notify::{ChannelId, NotifyChannel};
use std::fmt;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

const ERROR_EVENTS: libc::c_short = libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

/// Snapshot of which channels were readable when a wait returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadySet {
    a: bool,
    b: bool,
}

impl ReadySet {
    /// Empty snapshot.
    pub const NONE: ReadySet = ReadySet { a: false, b: false };
    /// Both channels ready.
    pub const BOTH: ReadySet = ReadySet { a: true, b: true };

    pub fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }

    /// Snapshot with a single channel ready.
    pub fn only(id: ChannelId) -> Self {
        match id {
            ChannelId::A => Self::new(true, false),
            ChannelId::B => Self::new(false, true),
        }
    }

    pub fn contains(&self, id: ChannelId) -> bool {
        match id {
            ChannelId::A => self.a,
            ChannelId::B => self.b,
        }
    }

    pub fn any(&self) -> bool {
        self.a || self.b
    }

    pub fn both(&self) -> bool {
        self.a && self.b
    }

    /// Ready channels in inspection order (A, then B).
    pub fn iter(&self) -> impl Iterator<Item = ChannelId> + '_ {
        ChannelId::ALL.into_iter().filter(|id| self.contains(*id))
    }
}

impl fmt::Display for ReadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.a, self.b) {
            (true, true) => write!(f, "A+B"),
            (true, false) => write!(f, "A"),
            (false, true) => write!(f, "B"),
            (false, false) => write!(f, "-"),
        }
    }
}

/// Result of one bounded wait.
#[derive(Debug)]
pub enum WaitOutcome {
    /// At least one channel became readable.
    Ready(ReadySet),
    /// The timeout elapsed with nothing ready.
    TimedOut,
    /// `poll(2)` failed, or a descriptor reported an error condition.
    Failed(io::Error),
}

impl WaitOutcome {
    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            WaitOutcome::Ready(_) => "ready",
            WaitOutcome::TimedOut => "timeout",
            WaitOutcome::Failed(_) => "failed",
        }
    }
}

/// Milliseconds for `poll(2)`, rounded up so a sub-millisecond timeout
/// still blocks, and clamped to `c_int::MAX`.
fn timeout_to_ms(timeout: Duration) -> libc::c_int {
    libc::c_int::try_from(timeout.as_micros().div_ceil(1000)).unwrap_or(libc::c_int::MAX)
}

/// Wait until `a` or `b` is readable, or until `timeout` elapses.
///
/// `EINTR` restarts the wait with the full timeout.
pub fn poll_pair(a: &NotifyChannel, b: &NotifyChannel, timeout: Duration) -> WaitOutcome {
    poll_raw_pair([a.as_raw_fd(), b.as_raw_fd()], timeout)
}

fn poll_raw_pair(fds: [RawFd; 2], timeout: Duration) -> WaitOutcome {
    let timeout_ms = timeout_to_ms(timeout);
    let mut pollfds = fds.map(|fd| libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    });

    loop {
        // SAFETY: pollfds is a stack array of two initialised pollfd entries.
        let res = unsafe {
            libc::poll(
                pollfds.as_mut_ptr(),
                pollfds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if res == 0 {
            return WaitOutcome::TimedOut;
        }
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                log::debug!("[poll] interrupted, restarting wait");
                continue;
            }
            return WaitOutcome::Failed(err);
        }
        break;
    }

    for id in ChannelId::ALL {
        let revents = pollfds[id.index()].revents;
        if revents & ERROR_EVENTS != 0 {
            return WaitOutcome::Failed(io::Error::other(format!(
                "channel {} reported revents {:#x}",
                id, revents
            )));
        }
    }

    WaitOutcome::Ready(ReadySet::new(
        pollfds[0].revents & libc::POLLIN != 0,
        pollfds[1].revents & libc::POLLIN != 0,
    ))
}

/// Zero-timeout readability probe for a single descriptor.
pub(crate) fn readable_now(fd: BorrowedFd<'_>) -> bool {
    let mut pollfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        // SAFETY: pollfd points to our stack-allocated pollfd structure.
        let res = unsafe { libc::poll(std::ptr::addr_of_mut!(pollfd), 1, 0) };
        if res < 0 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return res > 0 && pollfd.revents & libc::POLLIN != 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn times_out_when_nothing_pending() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");

        let start = Instant::now();
        let outcome = poll_pair(&a, &b, Duration::from_millis(20));
        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn reports_each_ready_channel() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");

        b.increment(1).expect("inc");
        match poll_pair(&a, &b, Duration::from_millis(100)) {
            WaitOutcome::Ready(set) => assert_eq!(set, ReadySet::only(ChannelId::B)),
            other => panic!("unexpected outcome {:?}", other),
        }

        a.increment(1).expect("inc");
        match poll_pair(&a, &b, Duration::from_millis(100)) {
            WaitOutcome::Ready(set) => assert!(set.both()),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn readiness_coalesces_until_drained() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");
        for _ in 0..5 {
            a.increment(2).expect("inc");
        }

        assert!(matches!(
            poll_pair(&a, &b, Duration::from_millis(100)),
            WaitOutcome::Ready(set) if set == ReadySet::only(ChannelId::A)
        ));
        assert_eq!(a.drain().expect("drain"), 10);
        assert!(matches!(
            poll_pair(&a, &b, Duration::from_millis(10)),
            WaitOutcome::TimedOut
        ));
    }

    #[test]
    fn ready_set_iterates_in_order() {
        let ids: Vec<_> = ReadySet::BOTH.iter().collect();
        assert_eq!(ids, vec![ChannelId::A, ChannelId::B]);
        assert_eq!(ReadySet::NONE.iter().count(), 0);
        assert_eq!(ReadySet::BOTH.to_string(), "A+B");
    }

    #[test]
    fn invalid_descriptor_is_a_failure_not_a_timeout() {
        let a = NotifyChannel::new().expect("a");
        // Far above any descriptor this process has open.
        let bogus: RawFd = 1 << 20;

        let outcome = poll_raw_pair([a.as_raw_fd(), bogus], Duration::from_millis(10));
        match outcome {
            WaitOutcome::Failed(err) => assert!(err.to_string().contains("channel B")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn oversized_timeout_is_clamped() {
        assert_eq!(timeout_to_ms(Duration::from_secs(u64::MAX)), libc::c_int::MAX);
        assert_eq!(timeout_to_ms(Duration::from_millis(1000)), 1000);
    }

    #[test]
    fn sub_millisecond_timeout_rounds_up() {
        assert_eq!(timeout_to_ms(Duration::ZERO), 0);
        assert_eq!(timeout_to_ms(Duration::from_micros(1)), 1);
        assert_eq!(timeout_to_ms(Duration::from_micros(500)), 1);
        assert_eq!(timeout_to_ms(Duration::from_micros(1500)), 2);
    }

    #[test]
    fn sub_millisecond_wait_blocks() {
        let a = NotifyChannel::new().expect("a");
        let b = NotifyChannel::new().expect("b");

        let start = Instant::now();
        let outcome = poll_pair(&a, &b, Duration::from_micros(500));
        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(start.elapsed() >= Duration::from_micros(500));
    }
}

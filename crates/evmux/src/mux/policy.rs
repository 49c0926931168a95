// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::notify::ChannelId;
use crate::poll::ReadySet;

/// What the loop does with one readiness snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    /// Channel to drain in this attempt, if any.
    pub drain: Option<ChannelId>,
    /// Latch value after this attempt.
    pub both_seen: bool,
    /// Sleep one time unit before the next attempt.
    pub backoff: bool,
}

/// Decide drain, latch and backoff for one snapshot.
///
/// Drain needs all three: the latch was already set entering the attempt,
/// the channel is `drain_target`, and it is ready in `ready`. The latch
/// only flips on a snapshot where both channels are ready and never resets.
/// Backoff is skipped once the latch is set.
pub fn inspect(ready: ReadySet, both_seen: bool, drain_target: ChannelId) -> Inspection {
    let drain = ready
        .iter()
        .find(|id| both_seen && *id == drain_target);
    let latched = both_seen || ready.both();

    Inspection {
        drain,
        both_seen: latched,
        backoff: ready.any() && !latched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ready_before_latch_backs_off() {
        let step = inspect(ReadySet::only(ChannelId::A), false, ChannelId::A);
        assert_eq!(
            step,
            Inspection {
                drain: None,
                both_seen: false,
                backoff: true,
            }
        );
    }

    #[test]
    fn latching_attempt_does_not_drain() {
        let step = inspect(ReadySet::BOTH, false, ChannelId::A);
        assert_eq!(step.drain, None);
        assert!(step.both_seen);
        assert!(!step.backoff);
    }

    #[test]
    fn drains_target_only_after_latch() {
        assert_eq!(
            inspect(ReadySet::BOTH, true, ChannelId::A).drain,
            Some(ChannelId::A)
        );
        assert_eq!(
            inspect(ReadySet::only(ChannelId::B), true, ChannelId::A).drain,
            None
        );
        assert_eq!(
            inspect(ReadySet::only(ChannelId::B), true, ChannelId::B).drain,
            Some(ChannelId::B)
        );
    }

    #[test]
    fn empty_snapshot_is_inert() {
        let step = inspect(ReadySet::NONE, false, ChannelId::A);
        assert_eq!(step.drain, None);
        assert!(!step.both_seen);
        assert!(!step.backoff);
    }
}

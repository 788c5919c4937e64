// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The timer surface (§4.4, component 5). The actual scheduler (monotonic,
//! cancellable, one-shot) is a host collaborator (§1, §6.4); this module
//! defines the contract and the per-record bookkeeping that enforces "every
//! timer field is mutually exclusive with itself" (§4.4).

//==============================================================================
// Imports
//==============================================================================

use ::std::time::Duration;

use crate::record::RecordId;

//==============================================================================
// Enumerations
//==============================================================================

/// The named supervision/retention/recall timers anchored per record
/// (§4.4). `Activate`/`Response` are not armed through this surface — they
/// ride as APDU response-descriptor timeouts (§4.2) — but share the enum so
/// a single `TIMEOUT_T_*` event vocabulary covers both sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Retention,
    Supervision,
    Recall,
    /// Zero-delay timer used to defer a subcommand past the current event
    /// tail (§4.4 T_INDIRECT).
    Indirect,
    /// PTMP agent poll deadline for `CCBSStatusRequest` (§4.4 T_CCBS1). A
    /// plain record timer: the per-participant result data arrives on its
    /// own path (§9 design note on broadcast aliasing) and only mutates the
    /// accumulator; this timer's firing is what promotes it.
    Ccbs1,
    /// T_CCBS1 + 2s guard (§4.4 EXTENDED_T_CCBS1).
    ExtendedCcbs1,
    /// Monitor-side deadline for a response to our cc-request invoke; rides
    /// as an APDU response descriptor (§4.2, §4.4 T_ACTIVATE), not a
    /// `RecordTimers` slot.
    Activate,
    /// Generic response deadline for other APDUs (§4.4 T_RESPONSE).
    Response,
}

/// An opaque, scheduler-assigned handle. `0` is never issued by a real
/// scheduler and doubles as "no timer armed".
pub type TimerHandle = u64;

//==============================================================================
// Traits
//==============================================================================

/// A monotonic, cancellable, one-shot timer service (§6.4). Firing invokes
/// the controller's dispatch with a `TIMEOUT_T_*` event for the given record
/// (§4.4); the scheduler itself has no knowledge of FSM semantics.
pub trait TimerScheduler {
    fn schedule(&mut self, delay: Duration, record_id: RecordId, kind: TimerKind) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
}

//==============================================================================
// Structures
//==============================================================================

/// Per-record timer bookkeeping (§3.3 fields `t_retention`, `t_supervision`,
/// `t_recall`, `t_indirect`). Re-arming a timer always cancels the previous
/// handle first (§4.4, §8.1 invariant).
#[derive(Debug, Clone, Default)]
pub struct RecordTimers {
    pub t_retention: Option<TimerHandle>,
    pub t_supervision: Option<TimerHandle>,
    pub t_recall: Option<TimerHandle>,
    pub t_indirect: Option<TimerHandle>,
    pub t_ccbs1: Option<TimerHandle>,
    pub t_extended_ccbs1: Option<TimerHandle>,
}

impl RecordTimers {
    pub fn arm(&mut self, scheduler: &mut dyn TimerScheduler, record_id: RecordId, kind: TimerKind, delay: Duration) {
        self.cancel(scheduler, kind);
        let handle = scheduler.schedule(delay, record_id, kind);
        *self.slot_mut(kind) = Some(handle);
        ::log::trace!("cc record {}: armed {:?} for {:?}", record_id, kind, delay);
    }

    pub fn cancel(&mut self, scheduler: &mut dyn TimerScheduler, kind: TimerKind) {
        if let Some(handle) = self.slot_mut(kind).take() {
            scheduler.cancel(handle);
            ::log::trace!("cc record: cancelled {:?}", kind);
        }
    }

    pub fn cancel_all(&mut self, scheduler: &mut dyn TimerScheduler) {
        for kind in [
            TimerKind::Retention,
            TimerKind::Supervision,
            TimerKind::Recall,
            TimerKind::Indirect,
            TimerKind::Ccbs1,
            TimerKind::ExtendedCcbs1,
        ] {
            self.cancel(scheduler, kind);
        }
    }

    /// Used by the self-destruct sanity check (§7, §8.1): `true` iff every
    /// timer handle is clear.
    pub fn all_clear(&self) -> bool {
        self.t_retention.is_none()
            && self.t_supervision.is_none()
            && self.t_recall.is_none()
            && self.t_indirect.is_none()
            && self.t_ccbs1.is_none()
            && self.t_extended_ccbs1.is_none()
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Retention => &mut self.t_retention,
            TimerKind::Supervision => &mut self.t_supervision,
            TimerKind::Recall => &mut self.t_recall,
            TimerKind::Indirect => &mut self.t_indirect,
            TimerKind::Ccbs1 => &mut self.t_ccbs1,
            TimerKind::ExtendedCcbs1 => &mut self.t_extended_ccbs1,
            TimerKind::Activate | TimerKind::Response => {
                panic!("{:?} is an APDU response timeout, not a RecordTimers slot", kind)
            },
        }
    }
}

//==============================================================================
// Unit tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ::std::collections::HashMap;

    #[derive(Default)]
    struct FakeScheduler {
        next: TimerHandle,
        live: HashMap<TimerHandle, (RecordId, TimerKind)>,
    }

    impl TimerScheduler for FakeScheduler {
        fn schedule(&mut self, _delay: Duration, record_id: RecordId, kind: TimerKind) -> TimerHandle {
            self.next += 1;
            self.live.insert(self.next, (record_id, kind));
            self.next
        }
        fn cancel(&mut self, handle: TimerHandle) {
            self.live.remove(&handle);
        }
    }

    #[test]
    fn rearming_cancels_previous_handle() {
        let mut sched = FakeScheduler::default();
        let mut timers = RecordTimers::default();
        timers.arm(&mut sched, 1, TimerKind::Supervision, Duration::from_secs(1));
        let first = timers.t_supervision.unwrap();
        assert!(sched.live.contains_key(&first));
        timers.arm(&mut sched, 1, TimerKind::Supervision, Duration::from_secs(2));
        assert!(!sched.live.contains_key(&first));
        assert_eq!(sched.live.len(), 1);
    }

    #[test]
    fn cancel_all_clears_everything() {
        let mut sched = FakeScheduler::default();
        let mut timers = RecordTimers::default();
        timers.arm(&mut sched, 1, TimerKind::Retention, Duration::from_secs(1));
        timers.arm(&mut sched, 1, TimerKind::Recall, Duration::from_secs(1));
        timers.cancel_all(&mut sched);
        assert!(timers.all_clear());
        assert!(sched.live.is_empty());
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! `pri_cc_event` (§4.5.3): selects the `(dialect, role) -> state -> handler`
//! table, runs the handler's action list, and evaluates `fsm_complete`.

//==============================================================================
// Imports
//==============================================================================

use ::std::{
    cell::RefCell,
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

use crate::{
    apdu::{
        ApduQueue,
        Disposition,
        InvokeId,
        MessageTarget,
        ResponseReason,
    },
    config::ControllerConfig,
    fsm::{
        ptmp_agent,
        ptmp_monitor,
        ptp_agent,
        ptp_monitor,
        qsig_agent,
        qsig_monitor,
        Dialect,
        Event,
        Role,
        State,
    },
    q931::{
        CallId,
        Q931Sink,
        RecallSetupParams,
    },
    record::{
        CcRecord,
        Pool,
        RecordId,
    },
    rose::ops::OutboundOp,
    subcommand::{
        Subcommand,
        SubcommandSink,
    },
    timer::{
        TimerKind,
        TimerScheduler,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Events a response callback wants to feed back into the dispatcher. A
/// callback runs deep inside `ApduQueue::on_response`/`on_message_type_seen`,
/// nowhere near a `Pool`/`TimerScheduler` borrow, and §4.5.3 forbids handlers
/// from calling the dispatcher recursively anyway — so it queues here and
/// the host drains it (via [`drain_pending`]) once the triggering dispatch
/// returns, the same deferred-delivery shape as `T_INDIRECT`.
pub type PendingEvents = Rc<RefCell<VecDeque<(RecordId, Event)>>>;

/// The context a dialect handler mutates (§4.5.4's action vocabulary, made
/// concrete). Handlers receive this plus the current `(state, event)` and
/// return the next state, or `None` for a no-op.
pub struct Ctx<'a> {
    pub record: &'a mut CcRecord,
    pub pool: &'a mut Pool,
    pub apdu: &'a mut ApduQueue,
    pub scheduler: &'a mut dyn TimerScheduler,
    pub q931: &'a mut dyn Q931Sink,
    pub subs: &'a mut dyn SubcommandSink,
    pub config: &'a ControllerConfig,
    pub pending: PendingEvents,
}

impl<'a> Ctx<'a> {
    /// The call leg currently carrying this record's signalling, falling
    /// back to the call that offered CC, falling back to the broadcast
    /// dummy call (PTMP fan-out).
    pub fn call_id(&self) -> CallId {
        self.record
            .signaling
            .or(self.record.original_call)
            .unwrap_or_else(|| self.q931.dummy_call())
    }

    /// A cloneable handle a `queue_with_response` callback can capture to
    /// post a follow-up event once its response actually arrives.
    pub fn pending_handle(&self) -> PendingEvents {
        self.pending.clone()
    }

    pub fn emit(&mut self, subcommand: Subcommand) {
        if !self.subs.emit(subcommand) {
            ::log::warn!("cc record {}: subcommand sink full, dropping {:?}", self.record.record_id, subcommand);
        }
    }

    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        let record_id = self.record.record_id;
        self.record.timers.arm(self.scheduler, record_id, kind, delay);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.record.timers.cancel(self.scheduler, kind);
    }

    pub fn cancel_all_timers(&mut self) {
        self.record.timers.cancel_all(self.scheduler);
    }

    /// Queues a fire-and-forget outbound operation on `call_id` (§4.2).
    pub fn queue(&mut self, call_id: CallId, target: MessageTarget, op: OutboundOp) {
        let record_id = self.record.record_id;
        self.apdu.queue(call_id, record_id, target, op);
    }

    /// Queues an outbound invoke expecting a response, arming `kind`'s
    /// timeout when the host message is actually sent (§4.2, §4.4).
    pub fn queue_with_response(
        &mut self,
        call_id: CallId,
        target: MessageTarget,
        op: OutboundOp,
        kind: TimerKind,
        timeout: Option<Duration>,
        callback: Box<dyn FnMut(ResponseReason) -> Disposition>,
    ) -> InvokeId {
        let record_id = self.record.record_id;
        self.apdu.queue_with_response(call_id, record_id, target, op, kind, timeout, callback)
    }

    pub fn send_facility_now(&mut self, call_id: CallId) {
        self.q931.send_facility_now(call_id);
    }

    pub fn send_recall_setup(&mut self, call_id: CallId, params: &RecallSetupParams) {
        self.q931.send_recall_setup(call_id, params);
    }

    /// §4.5.4 "mark self-destruct". The caller must have already stopped
    /// every record timer (rule (b), §4.5.4) — enforced by
    /// [`pri_cc_event`]'s post-dispatch sanity check.
    pub fn mark_self_destruct(&mut self) {
        self.record.fsm_complete = true;
    }
}

//==============================================================================
// Dispatch
//==============================================================================

/// Dispatches `event` to `record_id`'s `(dialect, role)` table (§4.5.3).
/// Unknown `(state, event)` pairs are no-ops, never errors (§7). If the
/// handler marks the record for self-destruction, it is removed from the
/// pool after this call returns.
#[allow(clippy::too_many_arguments)]
pub fn pri_cc_event(
    pool: &mut Pool,
    record_id: RecordId,
    event: Event,
    apdu: &mut ApduQueue,
    scheduler: &mut dyn TimerScheduler,
    q931: &mut dyn Q931Sink,
    subs: &mut dyn SubcommandSink,
    config: &ControllerConfig,
    pending: PendingEvents,
) {
    let Some((index, mut record)) = pool.take(record_id) else {
        ::log::warn!("pri_cc_event: record {} not found, dropping {:?}", record_id, event);
        return;
    };

    let dialect = record.dialect;
    let role = if record.is_agent { Role::Agent } else { Role::Monitor };
    let state = record.state;

    let mut ctx = Ctx {
        record: &mut record,
        pool,
        apdu,
        scheduler,
        q931,
        subs,
        config,
        pending,
    };

    let next = match (dialect, role) {
        (Dialect::EtsiPtmp, Role::Agent) => ptmp_agent::handle(&mut ctx, state, &event),
        (Dialect::EtsiPtmp, Role::Monitor) => ptmp_monitor::handle(&mut ctx, state, &event),
        (Dialect::EtsiPtp, Role::Agent) => ptp_agent::handle(&mut ctx, state, &event),
        (Dialect::EtsiPtp, Role::Monitor) => ptp_monitor::handle(&mut ctx, state, &event),
        (Dialect::Qsig, Role::Agent) => qsig_agent::handle(&mut ctx, state, &event),
        (Dialect::Qsig, Role::Monitor) => qsig_monitor::handle(&mut ctx, state, &event),
    };

    match next {
        Some(next_state) if next_state == state => {
            ::log::debug!("cc record {}: {:?} -> $ on {:?}", record_id, state, event);
            record.state = next_state;
        },
        Some(next_state) => {
            ::log::debug!("cc record {}: {:?} -> {:?} on {:?}", record_id, state, next_state, event);
            record.state = next_state;
        },
        None => {
            ::log::trace!("cc record {}: {:?} ignored {:?} (no transition)", record_id, state, event);
        },
    }

    if record.fsm_complete {
        #[cfg(feature = "sanity-checks")]
        sanity_check_before_destroy(&mut record, record_id, apdu, scheduler);
        // Not reinserted: the slot stays a tombstone and the record is
        // dropped here.
    } else {
        pool.put_back(index, record);
    }
}

pub fn new_pending_events() -> PendingEvents {
    Rc::new(RefCell::new(VecDeque::new()))
}

/// Drains events queued by response callbacks during the triggering
/// dispatch (§4.5.3). Draining can itself enqueue more (a drained event's
/// handler may, in turn, get its own response callback fire synchronously),
/// so this loops until the queue is empty rather than a single pass.
#[allow(clippy::too_many_arguments)]
pub fn drain_pending(
    pool: &mut Pool,
    apdu: &mut ApduQueue,
    scheduler: &mut dyn TimerScheduler,
    q931: &mut dyn Q931Sink,
    subs: &mut dyn SubcommandSink,
    config: &ControllerConfig,
    pending: PendingEvents,
) {
    loop {
        let next = pending.borrow_mut().pop_front();
        let Some((record_id, event)) = next else {
            break;
        };
        pri_cc_event(pool, record_id, event, apdu, scheduler, q931, subs, config, pending.clone());
    }
}

/// §7 "invariant violations (sanity checks)": any supervision/recall/
/// retention timer still running, or a still-pending T_CCBS1/T_ACTIVATE
/// APDU, at self-destruct time is an internal error — logged, and the
/// offending timer/APDU is force-cleared rather than leaked onto the host
/// scheduler (§7). Gated behind the `sanity-checks` feature the way the
/// original gates its debug asserts.
#[cfg(feature = "sanity-checks")]
fn sanity_check_before_destroy(record: &mut CcRecord, record_id: RecordId, apdu: &mut ApduQueue, scheduler: &mut dyn TimerScheduler) {
    if !record.timers.all_clear() {
        ::log::error!("cc record {}: self-destruct with a timer still armed: {:?}", record_id, record.timers);
        record.timers.cancel_all(scheduler);
    }
    if record.ptmp.t_ccbs1_invoke_id.is_some() {
        ::log::error!("cc record {}: self-destruct with a T_CCBS1 poll still outstanding", record_id);
        record.ptmp.t_ccbs1_invoke_id = None;
    }
    apdu.force_clear_record(scheduler, record_id);
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Q.SIG agent (§4.5.5 "Q.SIG agent/monitor"): the PINX adjacent to party B.
//! Availability is implicit (no `PENDING_AVAILABLE`/`CallInfoRetain` round
//! trip — ECMA-186 has no such offer), signalling-link retention is
//! negotiated per record, and `SIGNALING_GONE` disassociates rather than
//! destroys (a retention-released link is expected to go quiet for a while).

use crate::{
    apdu::MessageTarget,
    config::SignalingRetention,
    fsm::{
        Ctx,
        Event,
        State,
    },
    q931::MessageType,
    record::PartyAStatus,
    rose::ops::{
        rose_error_for,
        Dialect3,
        Operation,
        OperationData,
        OutboundOp,
    },
    subcommand::{
        ReqRspOutcome,
        Subcommand,
    },
    timer::TimerKind,
};

pub fn handle(ctx: &mut Ctx, state: State, event: &Event) -> Option<State> {
    match (state, event) {
        (State::Idle, Event::Available) => {
            ctx.emit(Subcommand::CcAvailable { cc_id: ctx.record.record_id });
            Some(State::Available)
        },

        (State::Available, Event::CcRequest) => {
            ctx.emit(Subcommand::CcReq { cc_id: ctx.record.record_id });
            Some(State::Requested)
        },

        (State::Requested, Event::CcRequestAccept) => {
            // §4.5.5: party-A's number being unavailable forces retention
            // regardless of the configured response policy.
            let retain = !ctx.record.party_a.number.is_available() || ctx.config.signaling_retention_rsp != SignalingRetention::Release;
            ctx.record.option.retain_signaling_link = retain;
            let operation = if ctx.record.is_ccnr { Operation::QsigCcnrRequest } else { Operation::QsigCcbsRequest };
            let call_id = ctx.call_id();
            ctx.queue(
                call_id,
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp { operation, data: OperationData { retain_signaling_link: Some(retain), ..Default::default() } },
            );
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Success { reference_id: None } });
            let supervision = if ctx.record.is_ccnr { ctx.config.timers.qsig_ccnr_t2 } else { ctx.config.timers.qsig_ccbs_t2 };
            ctx.arm(TimerKind::Supervision, supervision);
            if !retain {
                ctx.record.signaling = None;
            }
            Some(State::Activated)
        },
        (State::Requested, Event::CcRequestFail { status }) => {
            let error = rose_error_for(Dialect3::Qsig, *status);
            let operation = if ctx.record.is_ccnr { Operation::QsigCcnrRequest } else { Operation::QsigCcbsRequest };
            let call_id = ctx.call_id();
            ctx.queue(
                call_id,
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp { operation, data: OperationData { rose_error: Some(error), ..Default::default() } },
            );
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Error(error) });
            ctx.mark_self_destruct();
            Some(State::Idle)
        },

        (State::Activated, Event::BFree) => {
            ctx.emit(Subcommand::CcBFree { cc_id: ctx.record.record_id });
            Some(State::Activated)
        },
        (State::Activated, Event::RemoteUserFree) => {
            send_exec_possible(ctx);
            ctx.emit(Subcommand::CcRemoteUserFree { cc_id: ctx.record.record_id });
            ctx.arm(TimerKind::Recall, ctx.config.timers.qsig_cc_t3);
            if ctx.record.party_a_status == PartyAStatus::Busy { Some(State::Suspended) } else { Some(State::WaitCallback) }
        },
        (State::Activated | State::Suspended, Event::Suspend) => {
            ctx.record.party_a_status = PartyAStatus::Busy;
            Some(State::Suspended)
        },
        (State::Suspended, Event::Resume) => {
            ctx.record.party_a_status = PartyAStatus::Free;
            Some(State::WaitCallback)
        },

        (State::WaitCallback, Event::Recall) if ctx.record.party_a_status != PartyAStatus::Free => {
            deny_not_ready(ctx);
            Some(State::WaitCallback)
        },
        (State::WaitCallback, Event::Recall) => {
            ctx.cancel(TimerKind::Recall);
            ctx.emit(Subcommand::CcCall { cc_id: ctx.record.record_id });
            Some(State::Callback)
        },
        (State::WaitCallback, Event::TimeoutTRecall) => {
            begin_teardown(ctx);
            Some(State::WaitDestruction)
        },

        (_, Event::TimeoutTSupervision) => {
            begin_teardown(ctx);
            Some(State::WaitDestruction)
        },
        // A retention-released signalling link going quiet is expected, not
        // an error (§4.5.5): disassociate only, the record lives on.
        (_, Event::SignalingGone) if state != State::Idle && state != State::WaitDestruction => {
            ctx.record.signaling = None;
            Some(state)
        },
        (_, Event::LinkCancel) => {
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Specific(MessageType::Facility), OutboundOp { operation: Operation::QsigCcCancel, data: OperationData::default() });
            begin_teardown(ctx);
            Some(State::WaitDestruction)
        },
        (_, Event::Cancel) => {
            begin_teardown(ctx);
            Some(State::WaitDestruction)
        },
        (State::WaitDestruction, Event::HangupSignaling) => {
            if let Some(call_id) = ctx.record.signaling {
                ctx.q931.hangup(call_id);
            }
            ctx.mark_self_destruct();
            Some(State::Idle)
        },

        _ => None,
    }
}

fn send_exec_possible(ctx: &mut Ctx) {
    if ctx.record.signaling.is_none() {
        let call_id = ctx.q931.new_call();
        ctx.q931.send_register(call_id);
        ctx.record.signaling = Some(call_id);
    }
    let call_id = ctx.call_id();
    ctx.queue(call_id, MessageTarget::Any, OutboundOp { operation: Operation::QsigCcExecPossible, data: OperationData::default() });
}

fn deny_not_ready(ctx: &mut Ctx) {
    let call_id = ctx.call_id();
    let error = crate::rose::ops::not_ready_for_call_error(Dialect3::Qsig);
    ctx.queue(
        call_id,
        MessageTarget::Specific(MessageType::Facility),
        OutboundOp { operation: Operation::QsigCcRingout, data: OperationData { rose_error: Some(error), ..Default::default() } },
    );
}

/// Defers the actual link teardown past the current dispatch (§4.4
/// T_INDIRECT / `HANGUP_SIGNALING`) so a `ccCancel` queued moments ago gets a
/// chance to go out before the call is hung up.
fn begin_teardown(ctx: &mut Ctx) {
    ctx.cancel(TimerKind::Supervision);
    ctx.cancel(TimerKind::Recall);
    ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: true });
    ctx.arm(TimerKind::Indirect, ::std::time::Duration::ZERO);
}

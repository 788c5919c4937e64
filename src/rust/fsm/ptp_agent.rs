// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! ETSI PTP agent (§4.5.5 "PTP agent/monitor"): same event alphabet as PTMP
//! but carried over a dedicated CIS call, addressed rather than
//! linkage/reference-id keyed, with no `B_AVAILABLE` bus-polling state (§9
//! design notes: the six tables must not share entries across dialects).

use crate::{
    apdu::MessageTarget,
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
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Specific(MessageType::Facility), OutboundOp { operation: Operation::CcbsTAvailable, data: OperationData::default() });
            Some(State::Available)
        },

        (State::Available, Event::CcRequest) => {
            ctx.emit(Subcommand::CcReq { cc_id: ctx.record.record_id });
            Some(State::Requested)
        },

        (State::Requested, Event::CcRequestAccept) => {
            let operation = if ctx.record.is_ccnr { Operation::CcnrTRequest } else { Operation::CcbsTRequest };
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Specific(MessageType::Facility), OutboundOp { operation, data: OperationData::default() });
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Success { reference_id: None } });
            let supervision = if ctx.record.is_ccnr { ctx.config.timers.t_ccnr5 } else { ctx.config.timers.t_ccbs5 };
            ctx.arm(TimerKind::Supervision, supervision);
            Some(State::Activated)
        },
        (State::Requested, Event::CcRequestFail { status }) => {
            let error = rose_error_for(Dialect3::EtsiPtp, *status);
            let call_id = ctx.call_id();
            ctx.queue(
                call_id,
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp { operation: Operation::CcbsTRequest, data: OperationData { rose_error: Some(error), ..Default::default() } },
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
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Any, OutboundOp { operation: Operation::CcbsTRemoteUserFree, data: OperationData::default() });
            ctx.emit(Subcommand::CcRemoteUserFree { cc_id: ctx.record.record_id });
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
            ctx.emit(Subcommand::CcCall { cc_id: ctx.record.record_id });
            Some(State::Callback)
        },
        (State::WaitCallback, Event::TimeoutTRecall) => {
            erase_active(ctx);
            Some(State::Idle)
        },

        (_, Event::TimeoutTSupervision) => {
            erase_active(ctx);
            Some(State::Idle)
        },
        (_, Event::SignalingGone) if state != State::Idle && state != State::PendingAvailable => {
            ctx.cancel_all_timers();
            ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: true });
            ctx.mark_self_destruct();
            Some(State::Idle)
        },
        (_, Event::LinkCancel | Event::Cancel) => {
            erase_active(ctx);
            Some(State::Idle)
        },

        _ => None,
    }
}

fn deny_not_ready(ctx: &mut Ctx) {
    let call_id = ctx.call_id();
    let error = crate::rose::ops::not_ready_for_call_error(Dialect3::EtsiPtp);
    ctx.queue(
        call_id,
        MessageTarget::Specific(MessageType::Facility),
        OutboundOp { operation: Operation::CcbsTCall, data: OperationData { rose_error: Some(error), ..Default::default() } },
    );
}

/// PTP has no teardown invoke analogous to `CCBSErase` (§6.1): the CIS call
/// itself is the resource, so cancellation is communicated by hanging it up.
fn erase_active(ctx: &mut Ctx) {
    ctx.cancel_all_timers();
    let call_id = ctx.call_id();
    ctx.q931.hangup(call_id);
    ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: true });
    ctx.mark_self_destruct();
}


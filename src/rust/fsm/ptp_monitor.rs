// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! ETSI PTP monitor (§4.5.5 "PTP agent/monitor"): requests CC over a
//! dedicated CIS call it establishes with REGISTER.

use crate::{
    apdu::{
        Disposition,
        MessageTarget,
        ResponseReason,
    },
    fsm::{
        Ctx,
        Event,
        State,
    },
    q931::MessageType,
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
            send_request(ctx);
            Some(State::Requested)
        },

        (State::Requested, Event::CcRequestAccept) => {
            let supervision = if ctx.record.is_ccnr { ctx.config.timers.t_ccnr6 } else { ctx.config.timers.t_ccbs6 };
            ctx.arm(TimerKind::Supervision, supervision);
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Success { reference_id: None } });
            Some(State::Activated)
        },
        (State::Requested, Event::CcRequestFail { status }) => {
            let outcome = if let Some(code) = ctx.record.cc_req_rsp_failure.code {
                ReqRspOutcome::Error(code)
            } else if *status == crate::rose::ops::ReqStatus::Timeout {
                ReqRspOutcome::Timeout
            } else {
                ReqRspOutcome::Error(rose_error_for(Dialect3::EtsiPtp, *status))
            };
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome });
            let call_id = ctx.call_id();
            ctx.q931.hangup(call_id);
            ctx.mark_self_destruct();
            Some(State::Idle)
        },

        (State::Activated, Event::BFree) => {
            ctx.emit(Subcommand::CcBFree { cc_id: ctx.record.record_id });
            Some(State::Activated)
        },
        (State::Activated, Event::RemoteUserFree) => {
            ctx.emit(Subcommand::CcRemoteUserFree { cc_id: ctx.record.record_id });
            Some(State::WaitCallback)
        },
        (State::Activated, Event::Suspend) => {
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Any, OutboundOp { operation: Operation::CcbsTSuspend, data: OperationData::default() });
            Some(State::Suspended)
        },
        (State::Suspended, Event::Resume) => {
            let call_id = ctx.call_id();
            ctx.queue(call_id, MessageTarget::Any, OutboundOp { operation: Operation::CcbsTResume, data: OperationData::default() });
            Some(State::Activated)
        },

        (State::WaitCallback, Event::Recall) => {
            ctx.emit(Subcommand::CcCall { cc_id: ctx.record.record_id });
            Some(State::Callback)
        },

        (_, Event::TimeoutTSupervision | Event::SignalingGone) => {
            cancel_locally(ctx);
            Some(State::Idle)
        },
        (State::Activated | State::Suspended | State::WaitCallback | State::Callback, Event::LinkCancel) => {
            let call_id = ctx.call_id();
            ctx.q931.hangup(call_id);
            cancel_locally(ctx);
            Some(State::Idle)
        },

        _ => None,
    }
}

fn send_request(ctx: &mut Ctx) {
    if ctx.record.signaling.is_none() {
        let call_id = ctx.q931.new_call();
        ctx.q931.send_register(call_id);
        ctx.record.signaling = Some(call_id);
    }
    let record_id = ctx.record.record_id;
    let operation = if ctx.record.is_ccnr { Operation::CcnrTRequest } else { Operation::CcbsTRequest };
    let data = OperationData {
        party_a: Some(ctx.record.address_a()),
        party_b: Some(ctx.record.address_b()),
        saved_ies: Some(ctx.record.saved_ies.clone()),
        ..Default::default()
    };
    let call_id = ctx.call_id();
    let pending = ctx.pending_handle();
    ctx.queue_with_response(
        call_id,
        MessageTarget::Specific(MessageType::Facility),
        OutboundOp { operation, data },
        TimerKind::Activate,
        Some(ctx.config.timers.t_ccbs1),
        Box::new(move |reason| {
            let event = match reason {
                ResponseReason::Result => Event::CcRequestAccept,
                ResponseReason::Timeout => Event::CcRequestFail { status: crate::rose::ops::ReqStatus::Timeout },
                ResponseReason::Error | ResponseReason::Reject => Event::CcRequestFail { status: crate::rose::ops::ReqStatus::ShortTermDenial },
                ResponseReason::Cleanup => return Disposition::Done,
            };
            pending.borrow_mut().push_back((record_id, event));
            Disposition::Done
        }),
    );
}

fn cancel_locally(ctx: &mut Ctx) {
    ctx.cancel_all_timers();
    ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: false });
    ctx.mark_self_destruct();
}

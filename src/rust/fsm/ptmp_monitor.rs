// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! ETSI PTMP monitor (§4.5.5 "PTMP monitor"): the side that requested CC and
//! waits to be recalled.

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
            ctx.arm(TimerKind::Supervision, if ctx.record.is_ccnr { ctx.config.timers.t_ccnr2 } else { ctx.config.timers.t_ccbs2 });
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Success { reference_id: ctx.record.reference_id } });
            Some(State::Activated)
        },
        (State::Requested, Event::CcRequestFail { status }) => {
            let outcome = if let Some(code) = ctx.record.cc_req_rsp_failure.code {
                ReqRspOutcome::Error(code)
            } else if *status == crate::rose::ops::ReqStatus::Timeout {
                ReqRspOutcome::Timeout
            } else {
                ReqRspOutcome::Error(rose_error_for(Dialect3::EtsiPtmp, *status))
            };
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome });
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

        (State::WaitCallback, Event::Recall) => {
            ctx.emit(Subcommand::CcCall { cc_id: ctx.record.record_id });
            Some(State::Callback)
        },
        (State::WaitCallback, Event::StopAlerting) => {
            ctx.emit(Subcommand::CcStopAlerting { cc_id: ctx.record.record_id });
            Some(State::Activated)
        },
        (State::WaitCallback, Event::TimeoutTRecall) => {
            cancel_locally(ctx);
            Some(State::Idle)
        },

        (_, Event::TimeoutTSupervision | Event::Cancel) => {
            cancel_locally(ctx);
            Some(State::Idle)
        },
        (State::Activated | State::WaitCallback | State::Callback, Event::LinkCancel) => {
            send_deactivate(ctx);
            cancel_locally(ctx);
            Some(State::Idle)
        },

        _ => None,
    }
}

fn send_request(ctx: &mut Ctx) {
    let record_id = ctx.record.record_id;
    let is_ccnr = ctx.record.is_ccnr;
    let operation = if is_ccnr { Operation::CcnrRequest } else { Operation::CcbsRequest };
    let data = OperationData {
        linkage_id: ctx.record.linkage_id,
        recall_mode: Some(ctx.record.option.recall_mode),
        party_a: Some(ctx.record.address_a()),
        party_b: Some(ctx.record.address_b()),
        saved_ies: Some(ctx.record.saved_ies.clone()),
        ..Default::default()
    };
    let call_id = ctx.call_id();
    let pending = ctx.pending_handle();
    // The host stashes the decoded reference-id / recall-mode (on success)
    // or ROSE error code (on failure) directly onto the record before
    // calling `ApduQueue::on_response`/`on_message_type_seen`; this callback
    // only has to translate the *reason* into a follow-up event, never
    // calling the dispatcher itself (§4.5.3).
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

fn send_deactivate(ctx: &mut Ctx) {
    let call_id = ctx.call_id();
    ctx.queue(
        call_id,
        MessageTarget::Specific(MessageType::Facility),
        OutboundOp {
            operation: Operation::CcbsDeactivate,
            data: OperationData { reference_id: ctx.record.reference_id, ..Default::default() },
        },
    );
}

fn cancel_locally(ctx: &mut Ctx) {
    ctx.cancel_all_timers();
    ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: false });
    ctx.mark_self_destruct();
}

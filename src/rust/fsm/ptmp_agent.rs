// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! ETSI PTMP agent (§4.5.5 "PTMP agent"): the network side of an outbound
//! call that offered CC, tracked through availability, activation, and
//! recall.

use crate::{
    apdu::MessageTarget,
    config::RecallMode,
    fsm::{
        Ctx,
        Event,
        State,
    },
    q931::MessageType,
    record::PartyAStatus,
    rose::ops::{
        Dialect3,
        EraseReason,
        Operation,
        OperationData,
        OutboundOp,
        RoseError,
    },
    subcommand::{
        PartyAStatus as SubPartyAStatus,
        ReqRspOutcome,
        Subcommand,
    },
    timer::TimerKind,
};

const BUSY_CAUSE: u8 = 17;

pub fn handle(ctx: &mut Ctx, state: State, event: &Event) -> Option<State> {
    match (state, event) {
        (State::Idle, Event::Available) => Some(State::PendingAvailable),

        (State::PendingAvailable, Event::MsgAlerting) => {
            queue_call_info_retain(ctx, MessageType::Alerting);
            Some(State::Available)
        },
        (State::PendingAvailable, Event::MsgDisconnect { cause }) if *cause == BUSY_CAUSE => {
            queue_call_info_retain(ctx, MessageType::Disconnect);
            Some(State::Available)
        },
        (State::PendingAvailable, Event::InternalClearing | Event::MsgDisconnect { .. }) => {
            ctx.record.linkage_id = None;
            ctx.mark_self_destruct();
            Some(State::Idle)
        },

        (State::Available, Event::MsgRelease | Event::MsgReleaseComplete | Event::InternalClearing) => {
            ctx.arm(TimerKind::Retention, ctx.config.timers.t_retention);
            Some(State::Available)
        },
        (State::Available, Event::TimeoutTRetention) => {
            erase_linkage(ctx);
            ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: true });
            ctx.mark_self_destruct();
            Some(State::Idle)
        },
        (State::Available, Event::CcRequest) => {
            ctx.cancel(TimerKind::Retention);
            ctx.emit(Subcommand::CcReq { cc_id: ctx.record.record_id });
            Some(State::Requested)
        },

        (State::Requested, Event::CcRequestAccept) => {
            let reference_id = match ctx.pool.alloc_reference_id() {
                Ok(id) => id,
                Err(_) => {
                    deny_for_resource_exhaustion(ctx);
                    return Some(State::Idle);
                },
            };
            ctx.record.reference_id = Some(reference_id);
            let op = if ctx.record.is_ccnr { Operation::CcnrRequest } else { Operation::CcbsRequest };
            ctx.queue(
                ctx.call_id(),
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp {
                    operation: op,
                    data: OperationData {
                        reference_id: Some(reference_id),
                        recall_mode: Some(ctx.record.option.recall_mode),
                        ..Default::default()
                    },
                },
            );
            ctx.record.linkage_id = None;
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Success { reference_id: Some(reference_id) } });
            let supervision = if ctx.record.is_ccnr { ctx.config.timers.t_ccnr2 } else { ctx.config.timers.t_ccbs2 };
            ctx.arm(TimerKind::Supervision, supervision);
            Some(State::Activated)
        },
        (State::Requested, Event::CcRequestFail { status }) => {
            let error = crate::rose::ops::rose_error_for(Dialect3::EtsiPtmp, *status);
            let request_op = if ctx.record.is_ccnr { Operation::CcnrRequest } else { Operation::CcbsRequest };
            ctx.queue(
                ctx.call_id(),
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp { operation: request_op, data: OperationData { rose_error: Some(error), ..Default::default() } },
            );
            ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Error(error) });
            ctx.record.linkage_id = None;
            ctx.mark_self_destruct();
            Some(State::Idle)
        },

        (State::Activated, Event::BFree) => {
            queue_bus(ctx, Operation::CcbsBFree);
            Some(State::Activated)
        },
        (State::Activated, Event::RemoteUserFree) => {
            queue_bus(ctx, Operation::CcbsRemoteUserFree);
            ctx.emit(Subcommand::CcRemoteUserFree { cc_id: ctx.record.record_id });
            match ctx.record.party_a_status {
                PartyAStatus::Invalid => Some(State::BAvailable),
                PartyAStatus::Busy => {
                    queue_bus(ctx, Operation::CcbsBFree);
                    Some(State::Suspended)
                },
                PartyAStatus::Free => Some(State::WaitCallback),
            }
        },
        // A poll round is a guarded, throttled thing (§4.4 EXTENDED_T_CCBS1):
        // ACTIVATED only restarts one if none is already outstanding;
        // B_AVAILABLE/SUSPENDED never repoll off an unsolicited AStatus at
        // all (matches the original's per-state ASTATUS handling).
        (State::Activated, Event::AStatus) => {
            if ctx.record.timers.t_extended_ccbs1.is_none() {
                start_status_poll(ctx);
            }
            Some(state)
        },
        (State::BAvailable | State::Suspended, Event::AStatus) => Some(state),
        (State::Activated | State::BAvailable | State::Suspended, Event::AFree) => {
            ctx.record.ptmp.party_a_status_acc = ctx.record.ptmp.party_a_status_acc.join(PartyAStatus::Free);
            if ctx.record.timers.t_extended_ccbs1.is_some() {
                ctx.emit(Subcommand::CcStatus { cc_id: ctx.record.record_id, status: SubPartyAStatus::Free });
            }
            Some(state)
        },
        (State::Activated | State::BAvailable | State::Suspended, Event::ABusy) => {
            ctx.record.ptmp.party_a_status_acc = ctx.record.ptmp.party_a_status_acc.join(PartyAStatus::Busy);
            if ctx.record.timers.t_extended_ccbs1.is_some() {
                ctx.emit(Subcommand::CcStatus { cc_id: ctx.record.record_id, status: SubPartyAStatus::Busy });
            }
            Some(state)
        },
        (State::BAvailable | State::Suspended, Event::TimeoutTCcbs1) => Some(promote_status_poll(ctx, state)),
        (_, Event::TimeoutExtendedTCcbs1) => {
            ctx.cancel(TimerKind::ExtendedCcbs1);
            Some(state)
        },

        (State::WaitCallback, Event::Recall) if ctx.record.party_a_status != PartyAStatus::Free => {
            deny_recall_not_ready(ctx);
            Some(State::WaitCallback)
        },
        (State::WaitCallback, Event::Recall) => {
            ctx.emit(Subcommand::CcCall { cc_id: ctx.record.record_id });
            ctx.record.original_call = None;
            Some(State::Callback)
        },
        (State::Callback, Event::Recall) => {
            let call_id = ctx.call_id();
            ctx.queue(
                call_id,
                MessageTarget::Specific(MessageType::Facility),
                OutboundOp { operation: Operation::CcbsCall, data: OperationData { rose_error: Some(RoseError::CcbsAlreadyAccepted), ..Default::default() } },
            );
            ctx.q931.hangup(call_id);
            Some(State::Callback)
        },
        (State::WaitCallback, Event::StopAlerting) => {
            if ctx.record.option.recall_mode == RecallMode::Global {
                queue_bus(ctx, Operation::CcbsStopAlerting);
            }
            Some(State::Activated)
        },
        (State::WaitCallback, Event::TimeoutTRecall) => {
            erase_active(ctx, EraseReason::TCcbs3Timeout);
            Some(State::Idle)
        },

        (_, Event::TimeoutTSupervision) => {
            erase_active(ctx, EraseReason::TCcbs2Timeout);
            Some(State::Idle)
        },
        (_, Event::LinkCancel | Event::Cancel) => {
            erase_active(ctx, EraseReason::NormalUnspecified);
            Some(State::Idle)
        },

        _ => None,
    }
}

fn queue_call_info_retain(ctx: &mut Ctx, target: MessageType) {
    ctx.queue(
        ctx.call_id(),
        MessageTarget::Specific(target),
        OutboundOp {
            operation: Operation::CallInfoRetain,
            data: OperationData { linkage_id: ctx.record.linkage_id, ..Default::default() },
        },
    );
}

fn erase_linkage(ctx: &mut Ctx) {
    let call_id = ctx.call_id();
    ctx.queue(
        call_id,
        MessageTarget::Any,
        OutboundOp { operation: Operation::EraseCallLinkageId, data: OperationData { linkage_id: ctx.record.linkage_id, ..Default::default() } },
    );
    ctx.record.linkage_id = None;
}

fn queue_bus(ctx: &mut Ctx, operation: Operation) {
    let bus = ctx.q931.dummy_call();
    ctx.queue(
        bus,
        MessageTarget::Any,
        OutboundOp { operation, data: OperationData { reference_id: ctx.record.reference_id, ..Default::default() } },
    );
}

fn start_status_poll(ctx: &mut Ctx) {
    ctx.record.ptmp.party_a_status_acc = PartyAStatus::Invalid;
    queue_bus(ctx, Operation::CcbsStatusRequest);
    ctx.arm(TimerKind::Ccbs1, ctx.config.timers.t_ccbs1);
    ctx.arm(TimerKind::ExtendedCcbs1, ctx.config.timers.extended_t_ccbs1_guard);
}

/// Promotes the accumulated poll round into the confirmed status (§4.5.6).
fn promote_status_poll(ctx: &mut Ctx, state: State) -> State {
    ctx.cancel(TimerKind::Ccbs1);
    let confirmed = ctx.record.ptmp.party_a_status_acc;
    ctx.record.party_a_status = confirmed;
    match confirmed {
        PartyAStatus::Invalid => {
            ctx.record.ptmp.party_a_status_count += 1;
            if ctx.record.ptmp.party_a_status_count >= 3 {
                erase_active(ctx, EraseReason::NormalUnspecified);
                return State::Idle;
            }
            state
        },
        PartyAStatus::Busy => {
            ctx.record.ptmp.party_a_status_count = 0;
            state
        },
        PartyAStatus::Free => {
            ctx.record.ptmp.party_a_status_count = 0;
            State::WaitCallback
        },
    }
}

fn erase_active(ctx: &mut Ctx, reason: EraseReason) {
    ctx.cancel_all_timers();
    queue_bus_erase(ctx, reason);
    ctx.emit(Subcommand::CcCancel { cc_id: ctx.record.record_id, is_agent: true });
    ctx.mark_self_destruct();
}

fn queue_bus_erase(ctx: &mut Ctx, reason: EraseReason) {
    let bus = ctx.q931.dummy_call();
    ctx.queue(
        bus,
        MessageTarget::Any,
        OutboundOp { operation: Operation::CcbsErase, data: OperationData { reference_id: ctx.record.reference_id, erase_reason: Some(reason), ..Default::default() } },
    );
}

fn deny_recall_not_ready(ctx: &mut Ctx) {
    let call_id = ctx.call_id();
    let error = crate::rose::ops::not_ready_for_call_error(Dialect3::EtsiPtmp);
    ctx.queue(
        call_id,
        MessageTarget::Specific(MessageType::Facility),
        OutboundOp { operation: Operation::CcbsCall, data: OperationData { rose_error: Some(error), ..Default::default() } },
    );
    ctx.q931.hangup(call_id);
}

fn deny_for_resource_exhaustion(ctx: &mut Ctx) {
    let error = RoseError::CcbsOutgoingQueueFull;
    ctx.emit(Subcommand::CcReqRsp { cc_id: ctx.record.record_id, outcome: ReqRspOutcome::Error(error) });
    ctx.record.linkage_id = None;
    ctx.mark_self_destruct();
}

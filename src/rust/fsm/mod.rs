// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The FSM engine (§4.5, component 6): six dialect-specific transition
//! tables sharing one record type, dispatched by `pri_cc_event`.

mod engine;
pub mod ptmp_agent;
pub mod ptmp_monitor;
pub mod ptp_agent;
pub mod ptp_monitor;
pub mod qsig_agent;
pub mod qsig_monitor;

pub use engine::{
    drain_pending,
    new_pending_events,
    pri_cc_event,
    Ctx,
    PendingEvents,
};

use crate::rose::ops::ReqStatus;

//==============================================================================
// Enumerations
//==============================================================================

/// Which of the three signalling dialects a record belongs to (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    EtsiPtmp,
    EtsiPtp,
    Qsig,
}

/// Agent vs monitor (GLOSSARY). Derived from `CcRecord::is_agent`; kept as
/// its own type purely to index the six-table dispatch cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Agent,
    Monitor,
}

/// FSM states (§4.5.1). `BAvailable` is reachable only on the PTMP agent
/// table (§9 design notes: "the six tables must not share entries across
/// dialects").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    PendingAvailable,
    Available,
    Requested,
    Activated,
    BAvailable,
    Suspended,
    WaitCallback,
    Callback,
    WaitDestruction,
}

/// FSM events (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Offer side.
    Available,
    MsgAlerting,
    /// Carries the Q.931 cause so the PTMP-agent table can distinguish a
    /// busy-cause DISCONNECT from any other clearing cause (§4.5.5).
    MsgDisconnect { cause: u8 },
    MsgRelease,
    MsgReleaseComplete,
    InternalClearing,
    // Activation.
    CcRequest,
    CcRequestAccept,
    /// Carries the status the peer (or a local timeout) reported, so the
    /// handler can map it to the dialect's wire error (§6.3) without a
    /// second round through the record.
    CcRequestFail { status: ReqStatus },
    // Monitoring.
    RemoteUserFree,
    BFree,
    StopAlerting,
    // Party-A state (PTMP agent).
    AStatus,
    AFree,
    ABusy,
    // Recall & Q.SIG/PTP party-A.
    Suspend,
    Resume,
    Recall,
    // Lifecycle.
    LinkCancel,
    Cancel,
    SignalingGone,
    HangupSignaling,
    // Timers.
    TimeoutTRetention,
    TimeoutTSupervision,
    TimeoutTRecall,
    TimeoutTActivate,
    TimeoutTCcbs1,
    TimeoutExtendedTCcbs1,
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Event passthrough (§4.5.4, §6.4, component 8): the subcommands the core
//! reports to the application.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    record::RecordId,
    rose::ops::RoseError,
};

//==============================================================================
// Enumerations
//==============================================================================

/// Outcome of an activation attempt, reported exactly once per attempt via
/// `CC_REQ_RSP` (§7 "every activation attempt produces exactly one
/// `CC_REQ_RSP`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqRspOutcome {
    Success { reference_id: Option<u8> },
    Timeout,
    Error(RoseError),
    Reject,
}

/// Outcome of a status-request round (§4.5.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyAStatus {
    Free,
    Busy,
    Invalid,
}

/// The subcommand kinds the core reports to the application (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    /// CC is available to be requested on this record.
    CcAvailable { cc_id: RecordId },
    /// The peer asked to activate CC; the application must answer with
    /// `cc_req_rsp`.
    CcReq { cc_id: RecordId },
    CcReqRsp { cc_id: RecordId, outcome: ReqRspOutcome },
    /// The CC was cancelled — self-initiated, peer-initiated, or timed out
    /// (§7 "every cancel ... produces exactly one `CC_CANCEL`").
    CcCancel { cc_id: RecordId, is_agent: bool },
    CcStatus { cc_id: RecordId, status: PartyAStatus },
    CcStatusReq { cc_id: RecordId },
    CcStatusReqRsp { cc_id: RecordId, status: PartyAStatus },
    CcBFree { cc_id: RecordId },
    CcRemoteUserFree { cc_id: RecordId },
    CcStopAlerting { cc_id: RecordId },
    /// The recalled user is ringing; application may now bridge media.
    CcCall { cc_id: RecordId },
}

//==============================================================================
// Traits
//==============================================================================

/// The application-facing subcommand sink (§6.4). A full slot fails
/// silently: the event is dropped and the next Q.931 dispatch flushes
/// whatever batch made it through. The core never blocks or retries on a
/// full sink.
pub trait SubcommandSink {
    /// Returns `true` if the subcommand was accepted.
    fn emit(&mut self, subcommand: Subcommand) -> bool;
}

/// A sink that always accepts, handy for tests and for hosts with no
/// meaningful batch-size limit.
#[derive(Default)]
pub struct UnboundedSink {
    pub emitted: Vec<Subcommand>,
}

impl SubcommandSink for UnboundedSink {
    fn emit(&mut self, subcommand: Subcommand) -> bool {
        self.emitted.push(subcommand);
        true
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The ROSE operations the core generates and accepts (§6.1, §6.2), and the
//! status-code → wire-error taxonomy (§6.3). Values here are the decoded
//! payloads the ROSE codec hands us / takes from us — never raw ASN.1 bytes.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    config::RecallMode,
    party::Address,
    rose::SavedIes,
};

//==============================================================================
// Enumerations
//==============================================================================

/// Every named operation from §6.1/§6.2, tagged by dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    // ETSI PTMP
    CallInfoRetain,
    EraseCallLinkageId,
    CcbsRequest,
    CcnrRequest,
    CcbsDeactivate,
    CcbsInterrogate,
    CcnrInterrogate,
    CcbsErase,
    CcbsBFree,
    CcbsRemoteUserFree,
    CcbsStatusRequest,
    CcbsCall,
    CcbsStopAlerting,
    // ETSI PTP
    CcbsTAvailable,
    CcbsTRequest,
    CcnrTRequest,
    CcbsTRemoteUserFree,
    CcbsTSuspend,
    CcbsTResume,
    CcbsTCall,
    // Q.SIG
    QsigCcbsRequest,
    QsigCcnrRequest,
    QsigCcCancel,
    QsigCcExecPossible,
    QsigCcSuspend,
    QsigCcResume,
    QsigCcRingout,
    QsigCcPathReserve,
    // Miscellaneous, answered unconditionally (§9 open questions).
    LoopTest,
}

/// `CCBSErase` / Q.SIG cancel reason codes (§6.1: reasons 0-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseReason {
    NormalUnspecified = 0,
    TCcbs2Timeout = 1,
    TCcbs3Timeout = 2,
    BasicCallFailed = 3,
}

/// The status code passed to `cc_req_rsp` / `cc_status_req_rsp` (§4.6, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqStatus {
    Success,
    Timeout,
    ShortTermDenial,
    LongTermDenial,
    NotSubscribed,
    QueueFull,
}

/// The unified wire-error vocabulary; `rose_error_for` narrows this to the
/// variant valid for a given dialect (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoseError {
    CcbsShortTermDenial,
    CcbsLongTermDenial,
    CcbsOutgoingQueueFull,
    CcbsTShortTermDenial,
    CcbsTLongTermDenial,
    GenNotSubscribed,
    QsigShortTermRejection,
    QsigLongTermRejection,
    CcbsNotReadyForCall,
    CcbsAlreadyAccepted,
    CcbsInvalidReference,
    QsigFailureToMatch,
    QsigFailedDueToInterworking,
    GenNotAvailable,
}

//==============================================================================
// Structures
//==============================================================================

/// The generic payload every outbound CC invoke is built from (§6.1): ids,
/// recall mode, and — for requests — addressing/presentation and saved IEs.
/// Not every field is meaningful for every `Operation`; the FSM action that
/// builds one only fills in what that operation's ASN.1 module declares.
#[derive(Debug, Clone, Default)]
pub struct OperationData {
    pub linkage_id: Option<u8>,
    pub reference_id: Option<u8>,
    pub recall_mode: Option<RecallMode>,
    pub party_a: Option<Address>,
    pub party_b: Option<Address>,
    pub saved_ies: Option<SavedIes>,
    pub erase_reason: Option<EraseReason>,
    /// Set when this `OutboundOp` is actually a ROSE *error* response to the
    /// peer's invoke rather than a result (§6.3); the codec encodes it as an
    /// error component tagged with this code instead of a result.
    pub rose_error: Option<RoseError>,
    /// `CCBSStatusRequest` result: `true` if this bus participant answered
    /// "free".
    pub status_free: Option<bool>,
    pub retain_signaling_link: Option<bool>,
}

/// A single row of a `CCBSInterrogate`/`CCNRInterrogate` result set (§6.2).
#[derive(Debug, Clone)]
pub struct CallDetails {
    pub reference_id: u8,
    pub party_a: Address,
    pub party_b: Address,
    pub is_ccnr: bool,
}

/// The shape of a `CCBSInterrogate`/`CCNRInterrogate` reply (§6.2, §8.3): a
/// specific reference resolves to exactly one row, a no-reference query to
/// the whole matching set.
#[derive(Debug, Clone)]
pub enum InterrogateResult {
    One(CallDetails),
    Many(Vec<CallDetails>),
}

/// A fully-formed outbound operation, ready to be queued on the APDU queue.
#[derive(Debug, Clone)]
pub struct OutboundOp {
    pub operation: Operation,
    pub data: OperationData,
}

//==============================================================================
// Status -> wire error taxonomy (§6.3)
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect3 {
    EtsiPtmp,
    EtsiPtp,
    Qsig,
}

/// Maps a `cc_req_rsp` status code to the exactly-one ROSE error the wire
/// carries for that dialect (§6.3). `ReqStatus::Success` has no error and is
/// not handled here; callers only invoke this for failure statuses.
pub fn rose_error_for(dialect: Dialect3, status: ReqStatus) -> RoseError {
    use Dialect3::*;
    use ReqStatus::*;
    match (dialect, status) {
        (_, Success) => unreachable!("rose_error_for called with Success"),
        (EtsiPtmp, Timeout | ShortTermDenial) => RoseError::CcbsShortTermDenial,
        (EtsiPtmp, LongTermDenial) => RoseError::CcbsLongTermDenial,
        (EtsiPtmp, NotSubscribed) => RoseError::GenNotSubscribed,
        (EtsiPtmp, QueueFull) => RoseError::CcbsOutgoingQueueFull,
        (EtsiPtp, Timeout | ShortTermDenial) => RoseError::CcbsTShortTermDenial,
        (EtsiPtp, LongTermDenial) => RoseError::CcbsTLongTermDenial,
        (EtsiPtp, NotSubscribed) => RoseError::GenNotSubscribed,
        (EtsiPtp, QueueFull) => RoseError::CcbsTShortTermDenial,
        (Qsig, Timeout | ShortTermDenial) => RoseError::QsigShortTermRejection,
        (Qsig, LongTermDenial) => RoseError::QsigLongTermRejection,
        (Qsig, NotSubscribed) => RoseError::QsigLongTermRejection,
        (Qsig, QueueFull) => RoseError::QsigShortTermRejection,
    }
}

/// The error returned for a recall attempt while not ready (§6.3).
pub fn not_ready_for_call_error(dialect: Dialect3) -> RoseError {
    match dialect {
        Dialect3::EtsiPtmp | Dialect3::EtsiPtp => RoseError::CcbsNotReadyForCall,
        Dialect3::Qsig => RoseError::QsigFailureToMatch,
    }
}

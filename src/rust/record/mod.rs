// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The CC record (§3.3, component 4) — the heart of the controller — and
//! the pool that allocates, looks up, and destroys it (§4.3).

mod pool;

pub use self::pool::Pool;

//==============================================================================
// Imports
//==============================================================================

use crate::{
    apdu::InvokeId,
    config::RecallMode,
    fsm::{
        Dialect,
        State,
    },
    party::{
        Address,
        Party,
    },
    q931::{
        CallId,
        MessageType,
    },
    rose::{
        ops::{
            EraseReason,
            Operation,
            RoseError,
        },
        SavedIes,
    },
    timer::RecordTimers,
};

//==============================================================================
// Types
//==============================================================================

/// Monotonically assigned, 64k-space, per-controller unique id (§3.3).
/// Stable for the record's life and used by the application to refer to it.
pub type RecordId = u32;

/// The maximum `RecordId` value before the allocator wraps (§3.3, §4.3).
pub const MAX_RECORD_ID: RecordId = 0xffff;

pub type LinkageId = u8;
pub type ReferenceId = u8;

/// The maximum `LinkageId`/`ReferenceId` value (§3.3: "0..127 or INVALID").
pub const MAX_SEVEN_BIT_ID: u8 = 127;

//==============================================================================
// Enumerations
//==============================================================================

/// The raw party-A status lattice (§4.5.6): `{invalid, busy, free}` with
/// `free ∨ x = free` and `busy ∨ x = busy` unless `x = free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartyAStatus {
    #[default]
    Invalid,
    Busy,
    Free,
}

impl PartyAStatus {
    pub fn join(self, other: Self) -> Self {
        use PartyAStatus::*;
        match (self, other) {
            (Free, _) | (_, Free) => Free,
            (Busy, _) | (_, Busy) => Busy,
            (Invalid, Invalid) => Invalid,
        }
    }
}

//==============================================================================
// Structures
//==============================================================================

/// Negotiated/configured per-record options (§3.3 `option.*`).
#[derive(Debug, Clone)]
pub struct CcOptions {
    pub recall_mode: RecallMode,
    pub retain_signaling_link: bool,
}

/// PTMP-only bookkeeping (§3.3 `ptmp.*`). The T_CCBS1/EXTENDED_T_CCBS1 timer
/// handles themselves live on `CcRecord::timers` (they share the
/// record-timer mutual-exclusion machinery); `t_ccbs1_invoke_id` is purely
/// the bookkeeping of which broadcast invoke the current poll round is.
#[derive(Debug, Clone, Default)]
pub struct PtmpFields {
    pub party_a_status_acc: PartyAStatus,
    pub party_a_status_count: u8,
    pub t_ccbs1_invoke_id: Option<InvokeId>,
}

/// Q.SIG-only bookkeeping (§3.3 `qsig.msgtype`): the Q.931 carrier of the
/// current Q.SIG event (SETUP/CONNECT/FACILITY/RELEASE).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QsigCarrier {
    #[default]
    None,
    Setup,
    Connect,
    Facility,
    Release,
}

/// State needed to send the deferred result/error for the last peer
/// invocation this record must answer (§3.3 `response.*`).
#[derive(Debug, Clone, Default)]
pub struct ResponseFields {
    pub signaling: Option<CallId>,
    pub invoke_operation: Option<Operation>,
    pub invoke_id: Option<InvokeId>,
}

/// Saved failure details from the peer's rejection of our cc-request (§3.3
/// `msg.cc_req_rsp.*`).
#[derive(Debug, Clone, Default)]
pub struct CcReqRspFailure {
    pub reason: Option<EraseReason>,
    pub code: Option<RoseError>,
}

/// One CC interaction (§3.3). Created by `pri_cc_new_record`, mutated only
/// by the FSM engine and the ROSE-inbound handlers, destroyed by the FSM
/// engine setting `fsm_complete`.
#[derive(Debug, Clone)]
pub struct CcRecord {
    pub record_id: RecordId,
    pub dialect: Dialect,
    /// `true` if this end will perform the recall (network for PTMP, served
    /// PINX for Q.SIG/PTP) — §3.3, GLOSSARY "Agent"/"Monitor".
    pub is_agent: bool,
    pub linkage_id: Option<LinkageId>,
    pub reference_id: Option<ReferenceId>,
    pub party_a: Party,
    pub party_b: Party,
    pub saved_ies: SavedIes,
    pub bearer_cap: Vec<u8>,
    pub option: CcOptions,
    pub is_ccnr: bool,
    pub state: State,
    pub party_a_status: PartyAStatus,
    pub ptmp: PtmpFields,
    pub qsig_msgtype: QsigCarrier,
    pub response: ResponseFields,
    pub cc_req_rsp_failure: CcReqRspFailure,
    /// The Q.931 call leg currently carrying this CC's signalling. May be
    /// `None` while disassociated (Q.SIG only) — §3.3 invariant 3.
    pub signaling: Option<CallId>,
    /// Non-owning backreference to the call that offered CC, used only
    /// while pending availability (§3.3).
    pub original_call: Option<CallId>,
    pub timers: RecordTimers,
    /// Terminal flag: set during action execution, the dispatcher destroys
    /// the record after the current event returns (§3.3, §4.5.3).
    pub fsm_complete: bool,
}

impl CcRecord {
    pub fn address_a(&self) -> Address {
        self.party_a.address()
    }

    pub fn address_b(&self) -> Address {
        self.party_b.address()
    }

    /// Invariant 5 (§3.3): a record that `is_agent == true` never
    /// transitions on monitor-only events and vice versa. The dialect FSM
    /// tables alone carry the relevant edges; this is a debug-time aid for
    /// sanity-checking dispatch, not itself enforcement.
    pub fn role_matches(&self, want_agent: bool) -> bool {
        self.is_agent == want_agent
    }
}

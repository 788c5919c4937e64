// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The Q.931 message sink contract (§6.4). The Q.931 call-control engine
//! itself is out of scope (§1): it owns call legs, emits SETUP/CONNECT/
//! DISCONNECT/RELEASE/FACILITY, and routes inbound FACILITY IEs into this
//! core. This module defines only the boundary the core calls out through.

//==============================================================================
// Imports
//==============================================================================

use crate::{
    party::Address,
    rose::SavedIes,
};

//==============================================================================
// Types
//==============================================================================

/// A call leg handle, owned by the call-control engine (§3.3, §5: the
/// record holds a non-owning pointer to the call and vice versa).
pub type CallId = u64;

/// Q.931 message types the APDU queue and FSM actions reference (§4.2,
/// §6.1's envelope carriers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Setup,
    Alerting,
    Connect,
    Disconnect,
    Release,
    ReleaseComplete,
    Facility,
    Register,
}

/// Parameters for a recall SETUP built from a CC record's saved state
/// (§4.6 `cc_call`, §4.5.5 S3/Q.SIG `ccRingout`): called/remote-id/saved-IEs/
/// bearer-capability copied back from the original offering SETUP.
#[derive(Debug, Clone)]
pub struct RecallSetupParams {
    pub called: Address,
    pub calling: Address,
    pub saved_ies: SavedIes,
    pub bearer_capability: Vec<u8>,
}

//==============================================================================
// Traits
//==============================================================================

/// The host environment's Q.931 message sink (§6.4).
pub trait Q931Sink {
    /// Appends a FACILITY-IE payload tagged with a target Q.931 message type
    /// to `call_id`'s outbound APDU queue. Does not itself transmit.
    fn append_facility(&mut self, call_id: CallId, bytes: Vec<u8>, target: MessageType);

    /// Sends a FACILITY message on `call_id` right now, flushing whatever is
    /// queued for `Any`/`Facility`.
    fn send_facility_now(&mut self, call_id: CallId);

    fn send_connect(&mut self, call_id: CallId);
    fn send_disconnect(&mut self, call_id: CallId, cause: u8);
    fn send_release(&mut self, call_id: CallId);
    fn send_release_complete(&mut self, call_id: CallId);

    /// Q.SIG CIS signalling link establishment (§4.5.5 "PTP agent/monitor").
    fn send_register(&mut self, call_id: CallId);

    /// Builds a new outgoing SETUP for a CC recall (§4.6 `cc_call`).
    fn send_recall_setup(&mut self, call_id: CallId, params: &RecallSetupParams);

    /// Creates a new call leg on this D-channel (e.g. a CIS call for Q.SIG/
    /// PTP, or the recall call itself).
    fn new_call(&mut self) -> CallId;

    /// Destroys a call leg. The engine must emit `SIGNALING_GONE` to any
    /// attached CC record before actually freeing it (§5).
    fn destroy_call(&mut self, call_id: CallId);

    /// Marks `call_id` to be hung up once the current event finishes
    /// (§4.5.4 "immediately hang up the signalling link" / "post indirect
    /// HANGUP_SIGNALING").
    fn hangup(&mut self, call_id: CallId);

    fn find_call_by_link_id(&self, link_id: u32) -> Option<CallId>;
    fn held_peer(&self, call_id: CallId) -> Option<CallId>;

    /// The PTMP broadcast "dummy call" for this D-channel, used for
    /// CallInfoRetain/CCBSRequest/status-request fan-out (§9).
    fn dummy_call(&self) -> CallId;
}

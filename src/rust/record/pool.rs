// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The CC record pool (§4.3, component 4): an intrusive, insertion-ordered
//! collection with four lookups, all linear scans — the pool size is
//! bounded by the number of concurrent CC interactions on one D-channel,
//! typically small (§4.3).

//==============================================================================
// Imports
//==============================================================================

use crate::{
    error::{
        Fail,
        FailCause,
    },
    party::Address,
    record::{
        CcRecord,
        LinkageId,
        RecordId,
        ReferenceId,
        MAX_RECORD_ID,
        MAX_SEVEN_BIT_ID,
    },
    rose::SavedIes,
};

//==============================================================================
// Structures
//==============================================================================

/// The pool (§3.4): an insertion-ordered collection (tail-push preserves
/// chronological order for interrogation) plus the last-allocated counters
/// for each id space. Removed slots are left as tombstones rather than
/// shifting the Vec, so a record temporarily taken out for dispatch (see
/// [`Pool::take`]) can be put back at the same index.
#[derive(Default)]
pub struct Pool {
    slots: Vec<Option<CcRecord>>,
    next_record_id: RecordId,
    next_linkage_id: LinkageId,
    next_reference_id: ReferenceId,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    //--------------------------------------------------------------------
    // Id allocation (§4.3): wrap-around counters, skipping already-used ids.
    //--------------------------------------------------------------------

    pub fn alloc_record_id(&mut self) -> Result<RecordId, Fail> {
        let start = self.next_record_id;
        let mut candidate = start;
        loop {
            if !self.slots.iter().flatten().any(|r| r.record_id == candidate) {
                self.next_record_id = if candidate == MAX_RECORD_ID { 0 } else { candidate + 1 };
                return Ok(candidate);
            }
            candidate = if candidate == MAX_RECORD_ID { 0 } else { candidate + 1 };
            if candidate == start {
                ::log::error!("cc record-id space exhausted ({} records live)", self.slots.iter().flatten().count());
                return Err(Fail::new(FailCause::ResourceExhausted, "record id space exhausted"));
            }
        }
    }

    pub fn alloc_linkage_id(&mut self) -> Result<LinkageId, Fail> {
        let (id, next) = self.alloc_seven_bit_id(self.next_linkage_id, |r| r.linkage_id)?;
        self.next_linkage_id = next;
        Ok(id)
    }

    pub fn alloc_reference_id(&mut self) -> Result<ReferenceId, Fail> {
        let (id, next) = self.alloc_seven_bit_id(self.next_reference_id, |r| r.reference_id)?;
        self.next_reference_id = next;
        Ok(id)
    }

    fn alloc_seven_bit_id(&self, start: u8, used: impl Fn(&CcRecord) -> Option<u8>) -> Result<(u8, u8), Fail> {
        let mut candidate = start;
        loop {
            if !self.slots.iter().flatten().any(|r| used(r) == Some(candidate)) {
                let next = if candidate == MAX_SEVEN_BIT_ID { 0 } else { candidate + 1 };
                return Ok((candidate, next));
            }
            candidate = if candidate == MAX_SEVEN_BIT_ID { 0 } else { candidate + 1 };
            if candidate == start {
                ::log::error!("cc 7-bit id space exhausted (128th id requested with 127 outstanding)");
                return Err(Fail::new(FailCause::ResourceExhausted, "linkage/reference id space exhausted"));
            }
        }
    }

    //--------------------------------------------------------------------
    // Insertion / removal
    //--------------------------------------------------------------------

    pub fn insert(&mut self, record: CcRecord) -> RecordId {
        let id = record.record_id;
        self.slots.push(Some(record));
        id
    }

    /// Takes a record out of the pool for exclusive mutation during FSM
    /// dispatch (§4.5.3), returning its slot index so it can be restored to
    /// the same chronological position with [`Pool::put_back`].
    pub fn take(&mut self, record_id: RecordId) -> Option<(usize, CcRecord)> {
        let idx = self.slots.iter().position(|slot| matches!(slot, Some(r) if r.record_id == record_id))?;
        let record = self.slots[idx].take()?;
        Some((idx, record))
    }

    pub fn put_back(&mut self, index: usize, record: CcRecord) {
        self.slots[index] = Some(record);
    }

    pub fn remove(&mut self, record_id: RecordId) -> Option<CcRecord> {
        let idx = self.slots.iter().position(|slot| matches!(slot, Some(r) if r.record_id == record_id))?;
        self.slots[idx].take()
    }

    /// Drops tombstoned slots; purely a housekeeping optimization, never
    /// required for correctness (the pool is linearly scanned regardless).
    pub fn compact(&mut self) {
        self.slots.retain(Option::is_some);
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CcRecord> {
        self.slots.iter().flatten()
    }

    //--------------------------------------------------------------------
    // Lookups (§4.3)
    //--------------------------------------------------------------------

    pub fn find_by_record_id(&self, record_id: RecordId) -> Option<&CcRecord> {
        self.slots.iter().flatten().find(|r| r.record_id == record_id)
    }

    pub fn find_by_record_id_mut(&mut self, record_id: RecordId) -> Option<&mut CcRecord> {
        self.slots.iter_mut().flatten().find(|r| r.record_id == record_id)
    }

    pub fn find_by_reference_id(&self, reference_id: ReferenceId) -> Option<&CcRecord> {
        self.slots.iter().flatten().find(|r| r.reference_id == Some(reference_id))
    }

    pub fn find_by_linkage_id(&self, linkage_id: LinkageId) -> Option<&CcRecord> {
        self.slots.iter().flatten().find(|r| r.linkage_id == Some(linkage_id))
    }

    /// Given a candidate party-A address, party-B address, and (optionally)
    /// a saved-IE blob, finds a record whose `party_a` matches ignoring its
    /// presentation field, whose `party_b` matches exactly, and whose
    /// `saved_ies` compare equal per §3.2. `saved_ies = None` is treated as
    /// "don't care" (supplemented from `original_source`, used by
    /// interrogate-style matches). Underlies every Q.SIG/PTP request
    /// (§4.3).
    pub fn find_by_addressing(&self, party_a: &Address, party_b: &Address, saved_ies: Option<&SavedIes>) -> Option<&CcRecord> {
        self.slots.iter().flatten().find(|r| {
            r.party_a.matches_ignoring_presentation(party_a)
                && r.address_b() == *party_b
                && saved_ies.map(|ies| r.saved_ies == *ies).unwrap_or(true)
        })
    }
}

//==============================================================================
// Unit tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RecallMode,
        fsm::{
            Dialect,
            State,
        },
        party::Party,
        record::{
            CcOptions,
            CcReqRspFailure,
            PtmpFields,
            QsigCarrier,
            ResponseFields,
        },
        timer::RecordTimers,
    };

    fn blank_record(record_id: RecordId) -> CcRecord {
        CcRecord {
            record_id,
            dialect: Dialect::EtsiPtmp,
            is_agent: true,
            linkage_id: None,
            reference_id: None,
            party_a: Party::default(),
            party_b: Party::default(),
            saved_ies: SavedIes::default(),
            bearer_cap: Vec::new(),
            option: CcOptions { recall_mode: RecallMode::Global, retain_signaling_link: false },
            is_ccnr: false,
            state: State::Idle,
            party_a_status: Default::default(),
            ptmp: PtmpFields::default(),
            qsig_msgtype: QsigCarrier::default(),
            response: ResponseFields::default(),
            cc_req_rsp_failure: CcReqRspFailure::default(),
            signaling: None,
            original_call: None,
            timers: RecordTimers::default(),
            fsm_complete: false,
        }
    }

    #[test]
    fn record_id_allocator_skips_used_and_wraps() {
        let mut pool = Pool::new();
        let a = pool.alloc_record_id().unwrap();
        pool.insert(blank_record(a));
        let b = pool.alloc_record_id().unwrap();
        assert_ne!(a, b);
        pool.insert(blank_record(b));
        assert!(pool.find_by_record_id(a).is_some());
        assert!(pool.find_by_record_id(b).is_some());
    }

    #[test]
    fn seven_bit_id_exhausts_after_127_outstanding() {
        let mut pool = Pool::new();
        for i in 0..127u8 {
            let mut r = blank_record(pool.alloc_record_id().unwrap());
            r.linkage_id = Some(i);
            pool.insert(r);
        }
        assert!(pool.alloc_linkage_id().is_err());
    }

    #[test]
    fn take_and_put_back_preserves_order() {
        let mut pool = Pool::new();
        let a = pool.alloc_record_id().unwrap();
        pool.insert(blank_record(a));
        let b = pool.alloc_record_id().unwrap();
        pool.insert(blank_record(b));

        let (idx, mut taken) = pool.take(a).unwrap();
        taken.is_ccnr = true;
        pool.put_back(idx, taken);

        let ids: Vec<RecordId> = pool.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(pool.find_by_record_id(a).unwrap().is_ccnr);
    }

    #[test]
    fn find_by_addressing_ignores_party_a_presentation() {
        use crate::party::{
            Presentation,
            PriNumber,
            Screening,
            TypeOfNumber,
            NumberingPlan,
        };
        let mut pool = Pool::new();
        let id = pool.alloc_record_id().unwrap();
        let mut r = blank_record(id);
        r.party_a.number = PriNumber::new("493010", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Allowed(Screening::UserNotScreened));
        r.party_b.number = PriNumber::new("493020", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Allowed(Screening::UserNotScreened));
        pool.insert(r);

        let mut candidate_a = PriNumber::new("493010", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Restricted(Screening::Network));
        candidate_a.valid = true;
        let candidate_a = Address { number: candidate_a, subaddress: Default::default() };
        let candidate_b = Address {
            number: PriNumber::new("493020", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Allowed(Screening::UserNotScreened)),
            subaddress: Default::default(),
        };
        assert!(pool.find_by_addressing(&candidate_a, &candidate_b, None).is_some());
    }
}

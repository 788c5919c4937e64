// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Party value model (§3.1) and the encoders/decoders that bridge it to ROSE
//! wire fields (§4.1). This module owns the in-memory representation only;
//! bit-exact ASN.1 BER encoding of the ROSE fields themselves is an external
//! collaborator's job (the ROSE codec, out of scope per spec.md §1) — what
//! lives here is the lossless mapping between our `Number`/`Name`/
//! `Subaddress` structs and the enumerants/octets that codec expects.

mod name;
mod number;
mod subaddress;

pub use self::{
    name::{
        Name,
        NamePresentation,
    },
    number::{
        NumberingPlan,
        Presentation,
        PriNumber,
        Screening,
        TypeOfNumber,
    },
    subaddress::{
        Subaddress,
        SubaddressKind,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// A number + subaddress, no name (§3.1 "address").
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub number: PriNumber,
    pub subaddress: Subaddress,
}

impl Address {
    /// Same addressing match as [`Party::matches_ignoring_presentation`],
    /// for comparing two bare addresses (§4.3, §6.2 interrogate party-A
    /// filter).
    pub fn matches_ignoring_presentation(&self, other: &Address) -> bool {
        self.number.digits == other.number.digits
            && self.number.ton == other.number.ton
            && self.number.plan == other.number.plan
            && self.number.valid == other.number.valid
            && self.subaddress == other.subaddress
    }
}

/// A full party identity: number, subaddress, name (§3.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Party {
    pub number: PriNumber,
    pub subaddress: Subaddress,
    pub name: Name,
}

impl Party {
    pub fn address(&self) -> Address {
        Address {
            number: self.number.clone(),
            subaddress: self.subaddress.clone(),
        }
    }

    /// Addressing match used by the record pool's by-addressing lookup
    /// (§4.3): compares the number ignoring presentation, and the
    /// subaddress exactly.
    pub fn matches_ignoring_presentation(&self, other: &Address) -> bool {
        self.address().matches_ignoring_presentation(other)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Subaddress kind (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubaddressKind {
    #[default]
    Nsap,
    UserSpecified,
}

/// A subaddress: kind, bytes, odd/even-digit indicator, valid flag (§3.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subaddress {
    pub valid: bool,
    pub kind: SubaddressKind,
    pub odd_count: bool,
    pub data: Vec<u8>,
}

impl Subaddress {
    pub fn new(kind: SubaddressKind, data: impl Into<Vec<u8>>, odd_count: bool) -> Self {
        Self {
            valid: true,
            kind,
            odd_count,
            data: data.into(),
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::std::fmt;

//==============================================================================
// Enumerations
//==============================================================================

/// The three IE types a saved-IE blob may carry (§3.2). Codepoints match the
/// Q.931 information-element identifiers used across the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IeType {
    BearerCapability,
    HighLayerCompatibility,
    LowLayerCompatibility,
}

impl IeType {
    const ALL: [IeType; 3] = [Self::BearerCapability, Self::HighLayerCompatibility, Self::LowLayerCompatibility];

    fn codepoint(self) -> u8 {
        match self {
            Self::BearerCapability => 0x04,
            Self::LowLayerCompatibility => 0x7c,
            Self::HighLayerCompatibility => 0x7d,
        }
    }
}

//==============================================================================
// Structures
//==============================================================================

/// An immutable opaque byte buffer holding the concatenation of the
/// Bearer-Capability, High-Layer-Compatibility and Low-Layer-Compatibility
/// IEs as they appeared in the original SETUP (§3.2).
#[derive(Debug, Clone, Default)]
pub struct SavedIes {
    bytes: Vec<u8>,
}

impl SavedIes {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Walks the blob, reading single-octet (bit 8 set, no length field) or
    /// length-prefixed IEs, and returns the first occurrence of `ie_type`
    /// whose declared length fits within the blob (§4.1 "Saved-IE search").
    /// A malformed trailing fragment simply ends the walk; it is not an
    /// error (the original SETUP that produced this blob is long gone by
    /// the time we search it).
    pub fn find(&self, ie_type: IeType) -> Option<&[u8]> {
        let mut i = 0usize;
        while i < self.bytes.len() {
            let id = self.bytes[i];
            if id & 0x80 != 0 {
                // Single-octet IE: no length field, one byte total.
                if id & 0x7f == ie_type.codepoint() & 0x7f {
                    return Some(&self.bytes[i..=i]);
                }
                i += 1;
                continue;
            }
            if i + 1 >= self.bytes.len() {
                break;
            }
            let len = self.bytes[i + 1] as usize;
            let start = i + 2;
            let end = start + len;
            if end > self.bytes.len() {
                break;
            }
            if id == ie_type.codepoint() {
                return Some(&self.bytes[start..end]);
            }
            i = end;
        }
        None
    }

    /// Two blobs compare equal iff, for each of the three IE types, either
    /// both blobs lack that IE or both contain a byte-identical occurrence
    /// (by value and length) at its first appearance (§3.2).
    pub fn matches(&self, other: &SavedIes) -> bool {
        IeType::ALL.iter().all(|&ty| self.find(ty) == other.find(ty))
    }

    /// Truncates to `max_len` bytes if needed, per the emission-side
    /// truncation rule (§6.1, §8.3, §9 "Truncation of saved IEs"). Returns
    /// the (possibly truncated) bytes and whether truncation occurred; the
    /// caller is responsible for logging the diagnostic and still sending
    /// the invoke.
    pub fn truncated_for_wire(&self, max_len: usize) -> (&[u8], bool) {
        if self.bytes.len() <= max_len {
            (&self.bytes[..], false)
        } else {
            (&self.bytes[..max_len], true)
        }
    }
}

impl PartialEq for SavedIes {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}
impl Eq for SavedIes {}

impl fmt::Display for SavedIes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SavedIes({} bytes)", self.bytes.len())
    }
}

/// Builder that assembles a [`SavedIes`] blob out of individually-captured
/// IEs, in BC/LLC/HLC order, the way the original SETUP carried them.
#[derive(Debug, Clone, Default)]
pub struct SavedIesBuilder {
    bearer_capability: Option<Vec<u8>>,
    low_layer_compatibility: Option<Vec<u8>>,
    high_layer_compatibility: Option<Vec<u8>>,
}

impl SavedIesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bearer_capability(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.bearer_capability = Some(bytes.into());
        self
    }

    pub fn with_low_layer_compatibility(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.low_layer_compatibility = Some(bytes.into());
        self
    }

    pub fn with_high_layer_compatibility(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.high_layer_compatibility = Some(bytes.into());
        self
    }

    pub fn build(self) -> SavedIes {
        let mut bytes = Vec::new();
        if let Some(bc) = self.bearer_capability {
            push_ie(&mut bytes, IeType::BearerCapability.codepoint(), &bc);
        }
        if let Some(llc) = self.low_layer_compatibility {
            push_ie(&mut bytes, IeType::LowLayerCompatibility.codepoint(), &llc);
        }
        if let Some(hlc) = self.high_layer_compatibility {
            push_ie(&mut bytes, IeType::HighLayerCompatibility.codepoint(), &hlc);
        }
        SavedIes::from_bytes(bytes)
    }
}

fn push_ie(out: &mut Vec<u8>, codepoint: u8, content: &[u8]) {
    out.push(codepoint);
    out.push(content.len() as u8);
    out.extend_from_slice(content);
}

//==============================================================================
// Unit tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SavedIes {
        SavedIesBuilder::new()
            .with_bearer_capability([0x80, 0x90, 0xa3])
            .with_high_layer_compatibility([0x91, 0x81])
            .build()
    }

    #[test]
    fn find_locates_each_ie() {
        let s = sample();
        assert_eq!(s.find(IeType::BearerCapability), Some(&[0x80u8, 0x90, 0xa3][..]));
        assert_eq!(s.find(IeType::HighLayerCompatibility), Some(&[0x91u8, 0x81][..]));
        assert_eq!(s.find(IeType::LowLayerCompatibility), None);
    }

    #[test]
    fn equal_when_byte_identical() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn not_equal_when_bc_differs() {
        let a = sample();
        let b = SavedIesBuilder::new()
            .with_bearer_capability([0x80, 0x90, 0xa2])
            .with_high_layer_compatibility([0x91, 0x81])
            .build();
        assert_ne!(a, b);
    }

    #[test]
    fn not_equal_when_one_lacks_an_ie() {
        let a = sample();
        let b = SavedIesBuilder::new().with_bearer_capability([0x80, 0x90, 0xa3]).build();
        assert_ne!(a, b);
    }

    #[test]
    fn oversized_blob_is_truncated_not_dropped() {
        let s = SavedIesBuilder::new().with_bearer_capability(vec![0xffu8; 64]).build();
        let (bytes, truncated) = s.truncated_for_wire(8);
        assert!(truncated);
        assert_eq!(bytes.len(), 8);
        let (bytes2, truncated2) = s.truncated_for_wire(1024);
        assert!(!truncated2);
        assert_eq!(bytes2.len(), s.as_bytes().len());
    }
}

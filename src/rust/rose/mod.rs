// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! The ROSE bridge (§4.1, §4.2 component 2): saved-IE blobs, the operations
//! the core sends/accepts, and the status-code → ROSE-error taxonomy
//! (§6.3). Bit-exact ASN.1 BER encode/decode of these operations is the
//! external ROSE codec's job (§1); this module owns the operation payloads
//! as plain Rust values plus the saved-IE byte-level comparator.

pub mod ops;
mod saved_ies;

pub use self::saved_ies::{
    IeType,
    SavedIes,
    SavedIesBuilder,
};

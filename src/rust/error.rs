// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::thiserror::Error;

//==============================================================================
// Structures
//==============================================================================

/// Error type returned at the crate's public boundary.
///
/// FSM dispatch itself is infallible (see [`crate::fsm`]): a `(state, event)`
/// pair with no defined transition is a silent no-op, never an `Err`. `Fail`
/// is reserved for preconditions the application or Q.931 layer can get
/// wrong: bad configuration, an id space that's full, a `cc_id` that no
/// longer names a live record, or a caller invoking an agent-only /
/// monitor-only entry point on the wrong end.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{cause}: {message}")]
pub struct Fail {
    cause: FailCause,
    message: String,
}

/// Coarse classification of a [`Fail`], analogous to the errno-style code the
/// teacher's own `Fail` type carries alongside its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailCause {
    /// `cc_id` (or linkage/reference id) does not name a live record.
    NotFound,
    /// Operation is not valid for this record's dialect/role combination.
    WrongRole,
    /// An id space (linkage, reference, or record id) is exhausted.
    ResourceExhausted,
    /// Configuration value is out of range or internally inconsistent.
    InvalidConfig,
    /// Caller asked for a state transition not valid from the current state.
    InvalidState,
}

impl Fail {
    pub fn new(cause: FailCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }

    pub fn cause(&self) -> FailCause {
        self.cause
    }
}

impl ::std::fmt::Display for FailCause {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::WrongRole => "wrong role",
            Self::ResourceExhausted => "resource exhausted",
            Self::InvalidConfig => "invalid config",
            Self::InvalidState => "invalid state",
        };
        write!(f, "{}", s)
    }
}

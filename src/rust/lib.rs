// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! A Call Completion (CCBS/CCNR) supplementary-service controller for ISDN
//! PRI/BRI D-channels: ETSI point-to-multipoint, ETSI point-to-point, and
//! Q.SIG dialects, each as an agent (performs the recall) or a monitor
//! (requested it and waits to be recalled). The Q.931 call-control engine
//! and the ROSE ASN.1 codec are external collaborators (§6.4); this crate
//! owns the state machines, the record pool, the timer/APDU bookkeeping,
//! and the public API that ties them together.

#![cfg_attr(feature = "strict", deny(clippy::all))]
#![recursion_limit = "512"]

#[macro_use]
extern crate log;

pub mod apdu;
pub mod config;
pub mod controller;
pub mod error;
pub mod fsm;
pub mod party;
pub mod q931;
pub mod record;
pub mod rose;
pub mod subcommand;
pub mod timer;

pub use self::{
    config::{
        ControllerConfig,
        LocalType,
        RecallMode,
        SignalingRetention,
        SwitchType,
        TimerTable,
    },
    controller::{
        CcOffer,
        Controller,
    },
    error::{
        Fail,
        FailCause,
    },
    record::RecordId,
};

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::std::time::Duration;

//==============================================================================
// Enumerations
//==============================================================================

/// Signalling dialect selected for a D-channel controller. Fixed for the
/// controller's lifetime (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchType {
    EtsiE1,
    EtsiT1,
    Qsig,
}

impl SwitchType {
    /// The dialect this switchtype implies on its own, ignoring the
    /// `bri_ptp` config toggle that can narrow an ETSI switchtype down to
    /// point-to-point (§3.4).
    fn base_dialect(&self) -> crate::fsm::Dialect {
        match self {
            Self::EtsiE1 | Self::EtsiT1 => crate::fsm::Dialect::EtsiPtmp,
            Self::Qsig => crate::fsm::Dialect::Qsig,
        }
    }
}

/// Whether this D-channel endpoint is network- or customer-premises side.
/// Only NT may be a PTMP agent (§4.5.5, §6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalType {
    Net,
    Cpe,
}

/// `recall_mode` config key (§3.4, §6.5): whether a CC recall rings every
/// participant on the bus or only the party that originally activated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecallMode {
    Global,
    Specific,
}

/// `signaling_retention_req` / `signaling_retention_rsp` config keys (§4.5.5,
/// §6.5): Q.SIG signalling-link retention negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingRetention {
    Release,
    Demand,
    DontCare,
}

//==============================================================================
// Structures
//==============================================================================

/// Per-timer durations (§4.4, §6.5). Mirrors the teacher's
/// `Option<T>`-with-defaults config idiom (see `ArpConfig`/`TcpConfig`).
#[derive(Debug, Clone)]
pub struct TimerTable {
    pub t_retention: Duration,
    pub t_ccbs1: Duration,
    pub t_ccbs2: Duration,
    pub t_ccbs3: Duration,
    pub t_ccbs4: Duration,
    pub t_ccbs5: Duration,
    pub t_ccbs6: Duration,
    pub t_ccnr2: Duration,
    pub t_ccnr5: Duration,
    pub t_ccnr6: Duration,
    pub qsig_cc_t1: Duration,
    pub qsig_cc_t3: Duration,
    pub qsig_ccbs_t2: Duration,
    pub qsig_ccnr_t2: Duration,
    pub extended_t_ccbs1_guard: Duration,
}

impl TimerTable {
    /// Defaults drawn from ETSI EN 300-359/300-360 and ECMA-186 timer tables.
    pub fn new(
        t_retention: Option<Duration>,
        t_ccbs1: Option<Duration>,
        t_ccbs2: Option<Duration>,
        t_ccbs3: Option<Duration>,
        t_ccbs5: Option<Duration>,
        t_ccnr2: Option<Duration>,
        t_ccnr5: Option<Duration>,
    ) -> Self {
        Self {
            t_retention: t_retention.unwrap_or(Duration::from_secs(7200)),
            t_ccbs1: t_ccbs1.unwrap_or(Duration::from_secs(5)),
            t_ccbs2: t_ccbs2.unwrap_or(Duration::from_secs(3600 * 4)),
            t_ccbs3: t_ccbs3.unwrap_or(Duration::from_secs(20)),
            t_ccbs4: Duration::from_secs(30),
            t_ccbs5: t_ccbs5.unwrap_or(Duration::from_secs(3600 * 4)),
            t_ccbs6: Duration::from_secs(3600 * 4),
            t_ccnr2: t_ccnr2.unwrap_or(Duration::from_secs(3600 * 24)),
            t_ccnr5: t_ccnr5.unwrap_or(Duration::from_secs(3600 * 24)),
            t_ccnr6: Duration::from_secs(3600 * 24),
            qsig_cc_t1: Duration::from_secs(3),
            qsig_cc_t3: Duration::from_secs(20),
            qsig_ccbs_t2: Duration::from_secs(3600 * 4),
            qsig_ccnr_t2: Duration::from_secs(3600 * 24),
            extended_t_ccbs1_guard: t_ccbs1.unwrap_or(Duration::from_secs(5)) + Duration::from_secs(2),
        }
    }
}

impl Default for TimerTable {
    fn default() -> Self {
        Self::new(None, None, None, None, None, None, None)
    }
}

/// The configuration block read by the core (§3.4, §6.5).
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub switchtype: SwitchType,
    pub localtype: LocalType,
    pub cc_support: bool,
    pub deflection_support: bool,
    pub transfer_support: bool,
    pub mcid_support: bool,
    pub recall_mode: RecallMode,
    pub signaling_retention_req: SignalingRetention,
    pub signaling_retention_rsp: SignalingRetention,
    pub timers: TimerTable,
    /// Open question (§9, §3.4): whether CCBSBFree / CCBSRemoteUserFree /
    /// CCBSStatusRequest should carry a Called-Party IE identifying party-A
    /// (EN 300-195-1 §5.41 MSN interaction). Source flags this `XXX`;
    /// exposed here as a toggle rather than guessed at.
    pub include_party_a_in_bus_messages: bool,
    /// The dialect selector is independent of switchtype (§3.4: "a dialect
    /// selector (ETSI-PTP, ETSI-PTMP, Q.SIG)"): an ETSI BRI D-channel may run
    /// either point-to-multipoint or the dedicated-CIS point-to-point
    /// variant. `false` (the default) keeps an ETSI switchtype on PTMP;
    /// setting this narrows it to PTP. Meaningless for `SwitchType::Qsig`.
    pub bri_ptp: bool,
}

impl ControllerConfig {
    pub fn new(switchtype: SwitchType, localtype: LocalType) -> Self {
        Self {
            switchtype,
            localtype,
            cc_support: true,
            deflection_support: false,
            transfer_support: false,
            mcid_support: false,
            recall_mode: RecallMode::Global,
            signaling_retention_req: SignalingRetention::DontCare,
            signaling_retention_rsp: SignalingRetention::Release,
            timers: TimerTable::default(),
            include_party_a_in_bus_messages: false,
            bri_ptp: false,
        }
    }

    /// Selects ETSI point-to-point over the base ETSI switchtype (§3.4).
    pub fn with_bri_ptp(mut self, bri_ptp: bool) -> Self {
        self.bri_ptp = bri_ptp;
        self
    }

    /// The dialect this controller actually runs (§3.4): `switchtype` narrowed
    /// to `EtsiPtp` when `bri_ptp` is set.
    pub fn dialect(&self) -> crate::fsm::Dialect {
        if self.bri_ptp && matches!(self.switchtype, SwitchType::EtsiE1 | SwitchType::EtsiT1) {
            crate::fsm::Dialect::EtsiPtp
        } else {
            self.switchtype.base_dialect()
        }
    }

    /// Only an NT-side BRI-PTMP switchtype may act as a CC agent (§3.4) —
    /// PTP and Q.SIG have no such restriction, either PINX may recall.
    pub fn may_be_ptmp_agent(&self) -> bool {
        self.dialect() == crate::fsm::Dialect::EtsiPtmp && matches!(self.localtype, LocalType::Net)
    }
}

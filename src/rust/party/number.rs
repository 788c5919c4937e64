// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Enumerations
//==============================================================================

/// Type-of-number octet (high nibble of the Q.931 number IE), §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeOfNumber {
    #[default]
    Unknown,
    International,
    National,
    NetworkSpecific,
    Subscriber,
    Abbreviated,
}

/// Numbering-plan octet (low nibble of the Q.931 number IE), §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberingPlan {
    #[default]
    Unknown,
    Isdn,
    Data,
    Telex,
    National,
    Private,
}

/// Two-field presentation: restriction x screening (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Allowed(Screening),
    Restricted(Screening),
    /// "number not available due to interworking" — the single ROSE
    /// enumerant with no screening component (§4.1).
    NumberNotAvailable,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::Allowed(Screening::UserNotScreened)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    UserNotScreened,
    UserPassed,
    UserFailed,
    Network,
}

//==============================================================================
// Structures
//==============================================================================

/// A number as carried in the CC record (§3.1): valid flag, digits,
/// type-of-number + numbering-plan, and presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriNumber {
    pub valid: bool,
    pub digits: String,
    pub ton: TypeOfNumber,
    pub plan: NumberingPlan,
    pub presentation: Presentation,
}

impl Default for PriNumber {
    fn default() -> Self {
        Self {
            valid: false,
            digits: String::new(),
            ton: TypeOfNumber::default(),
            plan: NumberingPlan::default(),
            presentation: Presentation::default(),
        }
    }
}

impl PriNumber {
    pub fn new(digits: impl Into<String>, ton: TypeOfNumber, plan: NumberingPlan, presentation: Presentation) -> Self {
        Self {
            valid: true,
            digits: digits.into(),
            ton,
            plan,
            presentation,
        }
    }

    /// Whether this number actually identifies someone: `false` for an
    /// unset number or one presented as "not available due to
    /// interworking" (§4.5.5 Q.SIG retention rule).
    pub fn is_available(&self) -> bool {
        self.valid && !matches!(self.presentation, Presentation::NumberNotAvailable)
    }
}

//==============================================================================
// ROSE bridge (§4.1)
//==============================================================================

/// The three ROSE `Address`/`PresentedNumber` screening variants a number can
/// be encoded as, independent of which dialect's ASN.1 module declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosePresentation {
    PresentationAllowedAddress,
    PresentationRestricted,
    NumberNotAvailableDueToInterworking,
    PresentationAllowedScreened(RoseScreening),
    PresentationRestrictedScreened(RoseScreening),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoseScreening {
    UserProvidedNotScreened,
    UserProvidedVerifiedPassed,
    UserProvidedVerifiedFailed,
    NetworkProvided,
}

/// Presentation → ROSE (§4.1). A number marked invalid always collapses to
/// `NumberNotAvailableDueToInterworking` regardless of its presentation
/// field.
pub fn presentation_to_rose(number: &PriNumber) -> RosePresentation {
    if !number.valid {
        return RosePresentation::NumberNotAvailableDueToInterworking;
    }
    match number.presentation {
        Presentation::NumberNotAvailable => RosePresentation::NumberNotAvailableDueToInterworking,
        Presentation::Allowed(screening) => RosePresentation::PresentationAllowedScreened(screening_to_rose(screening)),
        Presentation::Restricted(screening) => RosePresentation::PresentationRestrictedScreened(screening_to_rose(screening)),
    }
}

fn screening_to_rose(screening: Screening) -> RoseScreening {
    match screening {
        Screening::UserNotScreened => RoseScreening::UserProvidedNotScreened,
        Screening::UserPassed => RoseScreening::UserProvidedVerifiedPassed,
        Screening::UserFailed => RoseScreening::UserProvidedVerifiedFailed,
        Screening::Network => RoseScreening::NetworkProvided,
    }
}

/// ROSE → presentation (§4.1). Folds screening into the presentation octet
/// when the enumerant carries a screened variant; plain (unscreened)
/// enumerants map to "user-provided, not screened".
pub fn presentation_from_rose(rose: RosePresentation) -> Presentation {
    match rose {
        RosePresentation::NumberNotAvailableDueToInterworking => Presentation::NumberNotAvailable,
        RosePresentation::PresentationAllowedAddress => Presentation::Allowed(Screening::UserNotScreened),
        RosePresentation::PresentationRestricted => Presentation::Restricted(Screening::UserNotScreened),
        RosePresentation::PresentationAllowedScreened(s) => Presentation::Allowed(screening_from_rose(s)),
        RosePresentation::PresentationRestrictedScreened(s) => Presentation::Restricted(screening_from_rose(s)),
    }
}

fn screening_from_rose(rose: RoseScreening) -> Screening {
    match rose {
        RoseScreening::UserProvidedNotScreened => Screening::UserNotScreened,
        RoseScreening::UserProvidedVerifiedPassed => Screening::UserPassed,
        RoseScreening::UserProvidedVerifiedFailed => Screening::UserFailed,
        RoseScreening::NetworkProvided => Screening::Network,
    }
}

/// Type-of-number / numbering-plan ROSE octets (§6 enum tables). Unknown
/// inputs downgrade to `Unknown` with a diagnostic rather than failing.
pub fn ton_from_octet(octet: u8) -> TypeOfNumber {
    match octet {
        0x1 => TypeOfNumber::International,
        0x2 => TypeOfNumber::National,
        0x3 => TypeOfNumber::NetworkSpecific,
        0x4 => TypeOfNumber::Subscriber,
        0x6 => TypeOfNumber::Abbreviated,
        0x0 => TypeOfNumber::Unknown,
        other => {
            ::log::warn!("unrecognized type-of-number octet {:#x}, downgrading to unknown", other);
            TypeOfNumber::Unknown
        },
    }
}

pub fn ton_to_octet(ton: TypeOfNumber) -> u8 {
    match ton {
        TypeOfNumber::Unknown => 0x0,
        TypeOfNumber::International => 0x1,
        TypeOfNumber::National => 0x2,
        TypeOfNumber::NetworkSpecific => 0x3,
        TypeOfNumber::Subscriber => 0x4,
        TypeOfNumber::Abbreviated => 0x6,
    }
}

pub fn plan_from_octet(octet: u8) -> NumberingPlan {
    match octet {
        0x1 => NumberingPlan::Isdn,
        0x3 => NumberingPlan::Data,
        0x4 => NumberingPlan::Telex,
        0x8 => NumberingPlan::National,
        0x9 => NumberingPlan::Private,
        0x0 => NumberingPlan::Unknown,
        other => {
            ::log::warn!("unrecognized numbering-plan octet {:#x}, downgrading to unknown", other);
            NumberingPlan::Unknown
        },
    }
}

pub fn plan_to_octet(plan: NumberingPlan) -> u8 {
    match plan {
        NumberingPlan::Unknown => 0x0,
        NumberingPlan::Isdn => 0x1,
        NumberingPlan::Data => 0x3,
        NumberingPlan::Telex => 0x4,
        NumberingPlan::National => 0x8,
        NumberingPlan::Private => 0x9,
    }
}

//==============================================================================
// Unit tests
//==============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_number_always_collapses_to_not_available() {
        let mut n = PriNumber::new("", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Allowed(Screening::UserPassed));
        n.valid = false;
        assert_eq!(presentation_to_rose(&n), RosePresentation::NumberNotAvailableDueToInterworking);
    }

    #[test]
    fn presentation_round_trips_through_rose() {
        for (p, expected_screen) in [
            (Presentation::Allowed(Screening::UserNotScreened), Screening::UserNotScreened),
            (Presentation::Allowed(Screening::Network), Screening::Network),
            (Presentation::Restricted(Screening::UserPassed), Screening::UserPassed),
        ] {
            let rose = presentation_to_rose(&PriNumber::new("493010", TypeOfNumber::National, NumberingPlan::Isdn, p));
            let back = presentation_from_rose(rose);
            match (p, back) {
                (Presentation::Allowed(_), Presentation::Allowed(s)) => assert_eq!(s, expected_screen),
                (Presentation::Restricted(_), Presentation::Restricted(s)) => assert_eq!(s, expected_screen),
                _ => panic!("presentation kind changed across round trip"),
            }
        }
    }

    #[test]
    fn unknown_ton_downgrades() {
        assert_eq!(ton_from_octet(0x7), TypeOfNumber::Unknown);
        assert_eq!(plan_from_octet(0xf), NumberingPlan::Unknown);
    }

    #[test]
    fn is_available_requires_valid_and_not_interworking() {
        assert!(!PriNumber::default().is_available());
        assert!(PriNumber::new("493010", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::Allowed(Screening::UserNotScreened)).is_available());
        assert!(!PriNumber::new("493010", TypeOfNumber::National, NumberingPlan::Isdn, Presentation::NumberNotAvailable).is_available());
    }
}

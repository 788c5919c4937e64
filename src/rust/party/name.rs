// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Name presentation (§4.1): five-valued enum whose "name not available"
/// case is emitted whenever the *number's* presentation says allowed but the
/// name string is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePresentation {
    PresentationAllowed,
    PresentationRestricted,
    #[default]
    NameNotAvailable,
    PresentationAllowedNetwork,
    PresentationRestrictedNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterSet {
    #[default]
    Iso8859_1,
    Ia5,
}

/// A name: valid flag, character set, presentation, string (§3.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Name {
    pub valid: bool,
    pub charset: CharacterSet,
    pub presentation: NamePresentation,
    pub text: String,
}

impl Name {
    pub fn new(text: impl Into<String>, charset: CharacterSet, presentation: NamePresentation) -> Self {
        let text = text.into();
        let presentation = if matches!(presentation, NamePresentation::PresentationAllowed | NamePresentation::PresentationAllowedNetwork) && text.is_empty() {
            NamePresentation::NameNotAvailable
        } else {
            presentation
        };
        Self {
            valid: true,
            charset,
            presentation,
            text,
        }
    }
}

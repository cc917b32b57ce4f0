//! Carrier classification for Cameroonian mobile numbers.
//!
//! Routing only looks at domestic numbers: nine digits, leading `6`,
//! optionally prefixed with the 237 country code. Anything else is not an
//! error, it just means "no carrier detected" and the caller falls back to
//! the default provider.

use serde::{Deserialize, Serialize};

/// Country calling code stripped during normalization.
pub const COUNTRY_CODE: &str = "237";

/// Length of a national mobile number.
pub const NATIONAL_LENGTH: usize = 9;

/// Prefixes owned by MTN Cameroon. Maintained by hand against the ART
/// numbering plan; disjoint from [`ORANGE_PREFIXES`].
pub const MTN_PREFIXES: &[&str] = &[
    "650", "651", "652", "653", "654", "67", "680", "681", "682", "683", "684",
];

/// Prefixes owned by Orange Cameroon.
pub const ORANGE_PREFIXES: &[&str] = &[
    "655", "656", "657", "658", "659", "69", "685", "686", "687", "688", "689",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Mtn,
    Orange,
}

impl Carrier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Carrier::Mtn => "mtn",
            Carrier::Orange => "orange",
        }
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierDetection {
    pub carrier: Carrier,
    pub national_number: String,
}

/// Normalize a raw phone string to a national mobile number.
///
/// Strips every non-digit character, then a leading `00` international
/// prefix, then a leading `237`. Returns `None` for anything that is not a
/// nine-digit number starting with `6`.
pub fn normalize(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let mut national = digits.as_str();
    if national.len() > NATIONAL_LENGTH && national.starts_with("00") {
        national = &national[2..];
    }
    if national.len() == NATIONAL_LENGTH + COUNTRY_CODE.len() && national.starts_with(COUNTRY_CODE)
    {
        national = &national[COUNTRY_CODE.len()..];
    }

    if national.len() != NATIONAL_LENGTH || !national.starts_with('6') {
        return None;
    }
    Some(national.to_string())
}

/// Classify a raw phone string against the static carrier prefix tables.
///
/// Returns `None` both for non-domestic input and for a valid domestic
/// number whose prefix is in neither table. Callers must treat `None` as
/// "use the default provider", never as a failure.
pub fn classify(raw: &str) -> Option<CarrierDetection> {
    let national = normalize(raw)?;
    let carrier = carrier_for(&national)?;
    Some(CarrierDetection {
        carrier,
        national_number: national,
    })
}

fn carrier_for(national: &str) -> Option<Carrier> {
    if MTN_PREFIXES.iter().any(|p| national.starts_with(p)) {
        return Some(Carrier::Mtn);
    }
    if ORANGE_PREFIXES.iter().any(|p| national.starts_with(p)) {
        return Some(Carrier::Orange);
    }
    None
}

//! General-purpose phone validation for request inputs.
//!
//! Unlike the classifier this accepts foreign numbers: it only answers
//! "does this look like a dialable number, and where is it from". It is
//! used to validate customer contact fields, never for provider routing.

use serde::Serialize;

/// Minimal numbering-plan facts for the markets the platform ships to.
/// (calling code, region, national length range)
const REGIONS: &[(&str, &str, usize, usize)] = &[
    ("237", "CM", 9, 9),
    ("234", "NG", 10, 10),
    ("225", "CI", 10, 10),
    ("221", "SN", 9, 9),
    ("241", "GA", 8, 9),
    ("235", "TD", 8, 8),
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PhoneValidation {
    pub is_valid: bool,
    pub is_possible: bool,
    pub country_code: Option<String>,
    pub national_number: Option<String>,
    pub region_code: Option<String>,
}

impl PhoneValidation {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            is_possible: false,
            country_code: None,
            national_number: None,
            region_code: None,
        }
    }
}

/// Validate a raw phone string against standard numbering-plan rules.
///
/// A number is `is_possible` when its digit count falls in the dialable
/// range (E.164 allows 7..=15 significant digits) and `is_valid` when it
/// also matches a known region's calling code and national length. Numbers
/// without an international prefix are assumed domestic (CM).
pub fn validate(raw: &str) -> PhoneValidation {
    let has_plus = raw.trim_start().starts_with('+');
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return PhoneValidation::invalid();
    }

    let international = has_plus || digits.starts_with("00");
    let digits = if !has_plus && digits.starts_with("00") {
        digits[2..].to_string()
    } else {
        digits
    };

    if !(7..=15).contains(&digits.len()) {
        return PhoneValidation::invalid();
    }

    if international {
        for (code, region, min, max) in REGIONS {
            if let Some(national) = digits.strip_prefix(code) {
                let valid = (*min..=*max).contains(&national.len());
                return PhoneValidation {
                    is_valid: valid,
                    is_possible: true,
                    country_code: Some((*code).to_string()),
                    national_number: valid.then(|| national.to_string()),
                    region_code: valid.then(|| (*region).to_string()),
                };
            }
        }
        // Dialable but from a region we have no plan data for.
        return PhoneValidation {
            is_valid: false,
            is_possible: true,
            country_code: None,
            national_number: None,
            region_code: None,
        };
    }

    // Domestic form: allow an explicit 237 prefix without the plus.
    let national = digits.strip_prefix("237").unwrap_or(&digits);
    let valid = national.len() == 9 && national.starts_with('6');
    PhoneValidation {
        is_valid: valid,
        is_possible: true,
        country_code: valid.then(|| "237".to_string()),
        national_number: valid.then(|| national.to_string()),
        region_code: valid.then(|| "CM".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domestic_number_is_valid() {
        let result = validate("650 12 34 56");
        assert!(result.is_valid);
        assert_eq!(result.region_code.as_deref(), Some("CM"));
        assert_eq!(result.national_number.as_deref(), Some("650123456"));
    }

    #[test]
    fn international_numbers_resolve_their_region() {
        let result = validate("+2348012345678");
        assert!(result.is_valid);
        assert_eq!(result.region_code.as_deref(), Some("NG"));
        assert_eq!(result.country_code.as_deref(), Some("234"));

        let result = validate("00221771234567");
        assert!(result.is_valid);
        assert_eq!(result.region_code.as_deref(), Some("SN"));
    }

    #[test]
    fn unknown_region_is_possible_but_not_valid() {
        let result = validate("+14155552671");
        assert!(result.is_possible);
        assert!(!result.is_valid);
        assert_eq!(result.region_code, None);
    }

    #[test]
    fn garbage_is_neither_valid_nor_possible() {
        assert_eq!(validate(""), PhoneValidation::invalid());
        assert_eq!(validate("hello"), PhoneValidation::invalid());
        assert!(!validate("123").is_possible);
    }

    #[test]
    fn wrong_national_length_fails_validation() {
        let result = validate("+23765012345"); // 8-digit national part
        assert!(result.is_possible);
        assert!(!result.is_valid);
    }
}

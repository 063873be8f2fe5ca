//! Card validator (C3): Luhn check, brand detection, PAN masking.

// Uses
use std::fmt::{self, Display, Formatter};

// Struct Implementation
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CardBrand {
	Visa,
	Mastercard,
	Amex,
	Discover,
	Jcb,
	Diners,
	Maestro,
	Unknown,
}

impl Display for CardBrand {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Visa => "Visa",
			Self::Mastercard => "Mastercard",
			Self::Amex => "American Express",
			Self::Discover => "Discover",
			Self::Jcb => "JCB",
			Self::Diners => "Diners Club",
			Self::Maestro => "Maestro",
			Self::Unknown => "Unknown",
		})
	}
}

/// The outcome of validating a PAN.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationResult {
	pub valid: bool,
	pub luhn_ok: bool,
	pub brand: CardBrand,
	pub masked: String,
	pub error: Option<String>,
}

fn digits_only(pan: &str) -> String {
	pan.chars().filter(char::is_ascii_digit).collect()
}

/// Luhn check: from the rightmost digit moving left, double every second
/// digit; if the doubled value exceeds 9, subtract 9; the PAN is valid iff
/// the digit sum is a multiple of 10.
#[must_use]
pub fn luhn_check(digits: &str) -> bool {
	let sum: u32 = digits
		.bytes()
		.rev()
		.enumerate()
		.map(|(i, b)| {
			let d = u32::from(b - b'0');
			if i % 2 == 1 {
				let doubled = d * 2;
				if doubled > 9 {
					doubled - 9
				} else {
					doubled
				}
			} else {
				d
			}
		})
		.sum();
	sum % 10 == 0
}

fn detect_brand(digits: &str) -> CardBrand {
	let len = digits.len();
	let starts_with = |prefix: &str| digits.starts_with(prefix);
	let prefix2: u32 = digits.get(0..2).and_then(|s| s.parse().ok()).unwrap_or(0);
	let prefix4: u32 = digits.get(0..4).and_then(|s| s.parse().ok()).unwrap_or(0);

	if starts_with("4") && (len == 13 || len == 16 || len == 19) {
		return CardBrand::Visa;
	}
	if (51..=55).contains(&prefix2) && len == 16 {
		return CardBrand::Mastercard;
	}
	if (2221..=2720).contains(&prefix4) && len == 16 {
		// The 2-series Mastercard BIN range is 222100-272099.
		let prefix6: u32 = digits.get(0..6).and_then(|s| s.parse().ok()).unwrap_or(0);
		if (222_100..=272_099).contains(&prefix6) {
			return CardBrand::Mastercard;
		}
	}
	if (starts_with("34") || starts_with("37")) && len == 15 {
		return CardBrand::Amex;
	}
	if (starts_with("6011") || (prefix2 == 65)) && len == 16 {
		return CardBrand::Discover;
	}
	if starts_with("2131") || starts_with("1800") || (starts_with("35") && len == 16) {
		return CardBrand::Jcb;
	}
	let prefix3: u32 = digits.get(0..3).and_then(|s| s.parse().ok()).unwrap_or(0);
	if ((300..=305).contains(&prefix3) || starts_with("36") || starts_with("38")) && len == 14 {
		return CardBrand::Diners;
	}
	if (matches!(prefix2, 50 | 56 | 57 | 58) || starts_with("6304") || starts_with("6390")
		|| starts_with("67")) && (12..=19).contains(&len)
	{
		return CardBrand::Maestro;
	}

	CardBrand::Unknown
}

/// PAN masking: keep the first 4 and last 4 digits, replace the rest with
/// `*`.
#[must_use]
pub fn mask_pan(pan: &str) -> String {
	let digits = digits_only(pan);
	let len = digits.len();
	if len <= 8 {
		return "*".repeat(len);
	}
	format!(
		"{}{}{}",
		&digits[..4],
		"*".repeat(len - 8),
		&digits[len - 4..]
	)
}

/// Validates `pan`: strips non-digits, requires length 13..19, runs the
/// Luhn check, and detects the card brand.
#[must_use]
pub fn validate(pan: &str) -> ValidationResult {
	let digits = digits_only(pan);

	if !(13..=19).contains(&digits.len()) {
		return ValidationResult {
			valid: false,
			luhn_ok: false,
			brand: CardBrand::Unknown,
			masked: mask_pan(&digits),
			error: Some(format!(
				"PAN length {} out of range (must be 13..19)",
				digits.len()
			)),
		};
	}

	let luhn_ok = luhn_check(&digits);
	let brand = detect_brand(&digits);
	let valid = luhn_ok && brand != CardBrand::Unknown;

	ValidationResult {
		valid,
		luhn_ok,
		brand,
		masked: mask_pan(&digits),
		error: if valid {
			None
		} else if !luhn_ok {
			Some("Luhn check failed".to_owned())
		} else {
			Some("unrecognised card brand".to_owned())
		},
	}
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn valid_visa_passes() {
		let result = validate("4532015112830366");
		assert!(result.luhn_ok);
		assert_eq!(result.brand, CardBrand::Visa);
		assert!(result.valid);
	}

	#[test]
	fn bad_check_digit_fails_luhn() {
		let result = validate("4532015112830367");
		assert!(!result.luhn_ok);
		assert!(!result.valid);
	}

	#[test]
	fn thirteen_digit_pan_accepted_when_it_passes_luhn() {
		// A correctly Luhn-checked 13-digit Visa PAN.
		let result = validate("4222222222222");
		assert!(result.luhn_ok);
		assert_eq!(result.brand, CardBrand::Visa);
	}

	#[test]
	fn twelve_digit_pan_rejected_on_length() {
		let result = validate("422222222222");
		assert!(!result.valid);
		assert!(result.error.is_some());
	}

	#[test]
	fn masking_keeps_first_and_last_four() {
		assert_eq!(mask_pan("4532015112830366"), "4532********0366");
	}

	#[test]
	fn luhn_closed_under_correct_check_digit_append() {
		// 7992739871 + check digit 3 is a well-known Luhn example.
		assert!(luhn_check("79927398713"));
	}

	#[test]
	fn mastercard_2_series_bin_detected() {
		let result = validate("2223000048410010");
		assert_eq!(result.brand, CardBrand::Mastercard);
	}

	#[test]
	fn amex_detected() {
		let result = validate("378282246310005");
		assert_eq!(result.brand, CardBrand::Amex);
	}
}

//! Utility functions for internal use by other components of the crate.

// Uses
use crate::error::CryptoError;

// Functions
/// Converts a hex string into raw bytes. Case-insensitive on input; all
/// gateway-internal hex strings are produced uppercase.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, CryptoError> {
	if hex.len() % 2 != 0 {
		return Err(CryptoError::InvalidHex(hex.to_owned()));
	}
	(0..hex.len())
		.step_by(2)
		.map(|i| {
			u8::from_str_radix(&hex[i..i + 2], 16)
				.map_err(|_| CryptoError::InvalidHex(hex.to_owned()))
		})
		.collect()
}

/// Converts raw bytes into an uppercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
	use std::fmt::Write;
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
		write!(s, "{b:02X}").expect("writing to a String never fails");
		s
	})
}

/// Validates that `hex` is exactly `len` hex characters.
pub fn expect_hex_len(hex: &str, len: usize) -> Result<(), CryptoError> {
	if hex.len() != len || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(CryptoError::InvalidLength {
			expected: len,
			found: hex.len(),
		});
	}
	Ok(())
}

/// Left-pads `value` with `pad` up to `len` characters, truncating from the
/// left if `value` is already longer (used for PAN-part derivation).
pub fn left_pad(value: &str, len: usize, pad: char) -> String {
	if value.len() >= len {
		value[value.len() - len..].to_owned()
	} else {
		let mut s = String::with_capacity(len);
		for _ in 0..(len - value.len()) {
			s.push(pad);
		}
		s.push_str(value);
		s
	}
}

/// Right-pads `value` with `pad` up to `len` characters, truncating from the
/// right if `value` is already longer.
pub fn right_pad(value: &str, len: usize, pad: char) -> String {
	if value.len() >= len {
		value[..len].to_owned()
	} else {
		let mut s = String::with_capacity(len);
		s.push_str(value);
		for _ in 0..(len - value.len()) {
			s.push(pad);
		}
		s
	}
}

/// Milliseconds since the Unix epoch. Used for RRN minting and activity
/// timestamps; saturates to zero rather than panicking on clock errors.
#[must_use]
pub fn now_ms() -> u128 {
	use std::time::{SystemTime, UNIX_EPOCH};
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis())
		.unwrap_or(0)
}

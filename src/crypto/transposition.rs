//! PIN-block transposition (C2): decrypt under a source key, re-encrypt
//! under a destination key, without the clear PIN ever being persisted or
//! logged. This is a pure function of its inputs.

// Uses
use crate::{
	crypto::{
		pinblock::{format0_decode, format0_encode},
		tdes::{tdes_decrypt, tdes_encrypt},
	},
	error::TranspositionError,
};

const PIN_BLOCK_HEX_LEN: usize = 16;
const MIN_PAN_DIGITS: usize = 12;

/// Re-encrypts `encrypted_pin_block` (currently under `source_key`) so it is
/// instead encrypted under `dest_key`, for the same `pan`. Both keys are
/// 32-hex EDE-2 TDES keys, matching the terminal/zonal/bank keys this
/// gateway deals in.
pub fn transpose(
	source_key: &str,
	dest_key: &str,
	encrypted_pin_block: &str,
	pan: &str,
) -> Result<String, TranspositionError> {
	if encrypted_pin_block.len() != PIN_BLOCK_HEX_LEN {
		return Err(TranspositionError::Crypto(crate::error::CryptoError::InvalidLength {
			expected: PIN_BLOCK_HEX_LEN,
			found: encrypted_pin_block.len(),
		}));
	}
	if encrypted_pin_block.bytes().all(|b| b == b'0') {
		return Err(TranspositionError::ZeroPinBlock);
	}
	let pan_digit_count = pan.chars().filter(char::is_ascii_digit).count();
	if pan_digit_count < MIN_PAN_DIGITS {
		return Err(TranspositionError::PanTooShort(pan_digit_count));
	}

	let clear_block = tdes_decrypt(encrypted_pin_block, source_key, false)?;
	let pin = format0_decode(&clear_block, pan)?;
	let new_clear = format0_encode(&pin, pan)?;
	let result = tdes_encrypt(&new_clear, dest_key, false)?;
	Ok(result)
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	const TERMINAL_KEY: &str = "0123456789ABCDEFFEDCBA9876543210";
	const ZONAL_KEY: &str = "1111111111111111AAAAAAAAAAAAAAAA";
	const BANK_KEY: &str = "2222222222222222BBBBBBBBBBBBBBBB";
	const PAN: &str = "4532015112830366";

	#[test]
	fn chained_transposition_round_trip() {
		let clear = crate::crypto::pinblock::format0_encode("1234", PAN).unwrap();
		let e_terminal = tdes_encrypt(&clear, TERMINAL_KEY, false).unwrap();

		let e_zonal = transpose(TERMINAL_KEY, ZONAL_KEY, &e_terminal, PAN).unwrap();
		let e_bank = transpose(ZONAL_KEY, BANK_KEY, &e_zonal, PAN).unwrap();

		let decrypted = tdes_decrypt(&e_bank, BANK_KEY, false).unwrap();
		let pin = crate::crypto::pinblock::format0_decode(&decrypted, PAN).unwrap();
		assert_eq!(pin, "1234");
	}

	#[test]
	fn rejects_all_zero_block() {
		let err = transpose(TERMINAL_KEY, ZONAL_KEY, "0000000000000000", PAN);
		assert_eq!(err, Err(TranspositionError::ZeroPinBlock));
	}

	#[test]
	fn rejects_short_pan() {
		let clear = crate::crypto::pinblock::format0_encode("1234", "1234567").unwrap();
		let e_terminal = tdes_encrypt(&clear, TERMINAL_KEY, false).unwrap();
		let err = transpose(TERMINAL_KEY, ZONAL_KEY, &e_terminal, "1234567");
		assert_eq!(err, Err(TranspositionError::PanTooShort(7)));
	}

	#[test]
	fn same_pan_short_circuit_matches_full_path() {
		// When the PAN doesn't change across the hop, the re-encrypted clear
		// block is identical to the original clear block.
		let clear = crate::crypto::pinblock::format0_encode("9876", PAN).unwrap();
		let e_terminal = tdes_encrypt(&clear, TERMINAL_KEY, false).unwrap();
		let e_zonal = transpose(TERMINAL_KEY, ZONAL_KEY, &e_terminal, PAN).unwrap();
		let expected = tdes_encrypt(&clear, ZONAL_KEY, false).unwrap();
		assert_eq!(e_zonal, expected);
	}
}

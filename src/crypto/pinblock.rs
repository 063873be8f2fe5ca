//! ISO 9564 Format-0 PIN block encode/decode.
//!
//! `PIN-field = 0L || PIN || pad 'F'` (16 hex chars); `PAN-field = "0000" ||
//! rightmost 12 digits of the PAN excluding the check digit`. The block is
//! the XOR of the two fields.

// Uses
use crate::{error::CryptoError, util::left_pad};

// Constants
const PIN_BLOCK_HEX_LEN: usize = 16;
const PAN_PART_DIGITS: usize = 12;
const MIN_PIN_LEN: usize = 4;
const MAX_PIN_LEN: usize = 12;

fn pan_part(pan: &str) -> String {
	let digits: String = pan.chars().filter(char::is_ascii_digit).collect();

	// Short PANs are used verbatim, check digit included; only
	// longer PANs have their check digit stripped before taking the
	// rightmost 12.
	let core = if digits.len() <= PAN_PART_DIGITS {
		digits
	} else {
		let without_check_digit = &digits[..digits.len() - 1];
		if without_check_digit.len() > PAN_PART_DIGITS {
			without_check_digit[without_check_digit.len() - PAN_PART_DIGITS..].to_owned()
		} else {
			without_check_digit.to_owned()
		}
	};
	format!("0000{}", left_pad(&core, PAN_PART_DIGITS, '0'))
}

fn xor_hex(a: &str, b: &str) -> String {
	a.bytes()
		.zip(b.bytes())
		.map(|(x, y)| {
			let xv = (x as char).to_digit(16).unwrap_or(0);
			let yv = (y as char).to_digit(16).unwrap_or(0);
			std::char::from_digit(xv ^ yv, 16)
				.unwrap_or('0')
				.to_ascii_uppercase()
		})
		.collect()
}

/// Encodes a clear PIN into a Format-0 PIN block (still in the clear — this
/// is the block that gets encrypted under a TDES key by the caller).
pub fn format0_encode(pin: &str, pan: &str) -> Result<String, CryptoError> {
	if pin.len() < MIN_PIN_LEN || pin.len() > MAX_PIN_LEN || !pin.bytes().all(|b| b.is_ascii_digit())
	{
		return Err(CryptoError::PinLengthOutOfRange(pin.len()));
	}

	let mut pin_field = format!("{:02}{}", pin.len(), pin);
	while pin_field.len() < PIN_BLOCK_HEX_LEN {
		pin_field.push('F');
	}

	Ok(xor_hex(&pin_field, &pan_part(pan)))
}

/// Decodes a clear Format-0 PIN block back into the PIN digits, reading the
/// PIN length from the leading nibble.
pub fn format0_decode(pin_block: &str, pan: &str) -> Result<String, CryptoError> {
	if pin_block.len() != PIN_BLOCK_HEX_LEN {
		return Err(CryptoError::InvalidLength {
			expected: PIN_BLOCK_HEX_LEN,
			found: pin_block.len(),
		});
	}

	let pin_field = xor_hex(pin_block, &pan_part(pan));
	let len_nibble = &pin_field[0..2];
	let pin_len: usize = len_nibble
		.parse()
		.map_err(|_| CryptoError::InvalidHex(pin_block.to_owned()))?;

	if !(MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin_len) {
		return Err(CryptoError::PinLengthOutOfRange(pin_len));
	}

	let pin = &pin_field[2..2 + pin_len];
	if !pin.bytes().all(|b| b.is_ascii_digit()) {
		return Err(CryptoError::InvalidHex(pin_block.to_owned()));
	}
	Ok(pin.to_owned())
}

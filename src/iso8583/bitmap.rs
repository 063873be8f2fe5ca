//! Bitmap pack/unpack, shared by both dictionaries. A bitmap is carried on
//! the wire either as 16 ASCII-hex characters (POS) or 8 raw binary bytes
//! (Bank); the in-memory representation is always a `u64` with bit 1 (the
//! MSB) as the secondary-bitmap indicator and bits 2..64 / 65..128 set for
//! present fields.

// Uses
use crate::error::FieldDecodeError;

/// Whether a bitmap is carried as ASCII hex or raw binary bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BitmapEncoding {
	AsciiHex,
	Binary,
}

/// Sets the bit for field `number` (2..=64 for primary, 65..=128 for
/// secondary — callers pass `number - 64` for the secondary word).
pub fn set_bit(word: &mut u64, local_number: u8) {
	*word |= 1u64 << (64 - u32::from(local_number));
}

/// Tests whether the bit for field `local_number` is set.
#[must_use]
pub fn bit_is_set(word: u64, local_number: u8) -> bool {
	word & (1u64 << (64 - u32::from(local_number))) != 0
}

/// The secondary-bitmap-present indicator is bit 1 (the MSB).
pub const SECONDARY_INDICATOR: u64 = 1u64 << 63;

/// Encodes a 64-bit bitmap word per `encoding`.
#[must_use]
pub fn encode(word: u64, encoding: BitmapEncoding) -> Vec<u8> {
	match encoding {
		BitmapEncoding::AsciiHex => format!("{word:016X}").into_bytes(),
		BitmapEncoding::Binary => word.to_be_bytes().to_vec(),
	}
}

/// Decodes a bitmap word starting at `cursor`, returning the word and the
/// number of bytes consumed.
pub fn decode(
	bytes: &[u8],
	cursor: usize,
	encoding: BitmapEncoding,
) -> Result<(u64, usize), FieldDecodeError> {
	match encoding {
		BitmapEncoding::AsciiHex => {
			let raw = bytes
				.get(cursor..cursor + 16)
				.ok_or_else(|| bitmap_error("ran out of bytes reading the ASCII-hex bitmap"))?;
			let text = std::str::from_utf8(raw)
				.map_err(|_| bitmap_error("bitmap is not valid ASCII"))?;
			let word = u64::from_str_radix(text, 16)
				.map_err(|_| bitmap_error("bitmap is not valid hex"))?;
			Ok((word, 16))
		}
		BitmapEncoding::Binary => {
			let raw = bytes
				.get(cursor..cursor + 8)
				.ok_or_else(|| bitmap_error("ran out of bytes reading the binary bitmap"))?;
			let mut buf = [0u8; 8];
			buf.copy_from_slice(raw);
			Ok((u64::from_be_bytes(buf), 8))
		}
	}
}

fn bitmap_error(reason: &str) -> FieldDecodeError {
	FieldDecodeError::Invalid {
		number: 1,
		reason: reason.to_owned(),
	}
}

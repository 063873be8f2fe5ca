//! Field-dictionary entries (D): the encoding rule for a single field
//! number, shared in shape by both the POS and Bank dictionaries (C4).

// Uses
use crate::{
	error::FieldDecodeError,
	util::{bytes_to_hex, right_pad},
};

// Struct Implementation
/// How a field's value is carried on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldEncoding {
	/// Fixed-length, ASCII digits, left-padded with `'0'`.
	FixedNumeric(usize),
	/// Fixed-length, ASCII chars, right-padded with `' '`.
	FixedChar(usize),
	/// Fixed-length, raw binary bytes; the in-memory value is the
	/// uppercase hex rendering (twice the byte length).
	FixedBinary(usize),
	/// 2-digit ASCII decimal length header followed by that many ASCII
	/// digits.
	LlNum(usize),
	/// 2-digit ASCII decimal length header followed by that many ASCII
	/// chars (used for field 35, whose Track 2 data carries `=`/`D`
	/// separators and discretionary data alongside digits).
	LlChar(usize),
	/// 3-digit ASCII decimal length header followed by that many ASCII
	/// chars.
	LllChar(usize),
	/// 3-digit ASCII decimal length header (byte count) followed by that
	/// many raw binary bytes; in-memory value is uppercase hex.
	LllBinary(usize),
}

/// A single field-dictionary entry.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
	pub number: u8,
	pub encoding: FieldEncoding,
}

impl FieldDef {
	#[must_use]
	pub const fn new(number: u8, encoding: FieldEncoding) -> Self {
		Self { number, encoding }
	}

	/// Encodes `value` per this field's rule, appending wire bytes to `out`.
	pub fn encode(&self, value: &str, out: &mut Vec<u8>) -> Result<(), FieldDecodeError> {
		use FieldEncoding::{FixedBinary, FixedChar, FixedNumeric, LlChar, LlNum, LllBinary, LllChar};

		match self.encoding {
			FixedNumeric(len) => {
				if value.len() > len || !value.bytes().all(|b| b.is_ascii_digit()) {
					return Err(self.invalid(format!(
						"expected up to {len} numeric digits, found {value:?}"
					)));
				}
				out.extend(format!("{value:0>len$}").into_bytes());
			}
			FixedChar(len) => {
				if value.len() > len {
					return Err(self.invalid(format!("expected up to {len} chars, found {value:?}")));
				}
				out.extend(right_pad(value, len, ' ').into_bytes());
			}
			FixedBinary(byte_len) => {
				let bytes = self.hex_value_to_bytes(value, byte_len)?;
				out.extend(bytes);
			}
			LlNum(max) => {
				if value.len() > max || !value.bytes().all(|b| b.is_ascii_digit()) {
					return Err(self.invalid(format!("expected up to {max} numeric digits")));
				}
				if value.len() > 99 {
					return Err(self.invalid("LL length header cannot exceed 99".to_owned()));
				}
				out.extend(format!("{:02}", value.len()).into_bytes());
				out.extend(value.bytes());
			}
			LlChar(max) => {
				if value.len() > max {
					return Err(self.invalid(format!("expected up to {max} chars")));
				}
				if value.len() > 99 {
					return Err(self.invalid("LL length header cannot exceed 99".to_owned()));
				}
				out.extend(format!("{:02}", value.len()).into_bytes());
				out.extend(value.bytes());
			}
			LllChar(max) => {
				if value.len() > max {
					return Err(self.invalid(format!("expected up to {max} chars")));
				}
				if value.len() > 999 {
					return Err(self.invalid("LLL length header cannot exceed 999".to_owned()));
				}
				out.extend(format!("{:03}", value.len()).into_bytes());
				out.extend(value.bytes());
			}
			LllBinary(max_bytes) => {
				let bytes = self.hex_value_to_bytes(value, value.len() / 2)?;
				if bytes.len() > max_bytes {
					return Err(self.invalid(format!("expected up to {max_bytes} bytes")));
				}
				out.extend(format!("{:03}", bytes.len()).into_bytes());
				out.extend(bytes);
			}
		}
		Ok(())
	}

	/// Decodes this field starting at `cursor` in `bytes`, returning the
	/// decoded value and the new cursor position.
	pub fn decode(&self, bytes: &[u8], cursor: usize) -> Result<(String, usize), FieldDecodeError> {
		use FieldEncoding::{FixedBinary, FixedChar, FixedNumeric, LlChar, LlNum, LllBinary, LllChar};

		match self.encoding {
			FixedNumeric(len) => {
				let raw = self.take(bytes, cursor, len)?;
				if !raw.iter().all(u8::is_ascii_digit) {
					return Err(self.invalid("expected numeric digits".to_owned()));
				}
				Ok((String::from_utf8_lossy(raw).into_owned(), cursor + len))
			}
			FixedChar(len) => {
				let raw = self.take(bytes, cursor, len)?;
				Ok((
					String::from_utf8_lossy(raw).trim_end().to_owned(),
					cursor + len,
				))
			}
			FixedBinary(byte_len) => {
				let raw = self.take(bytes, cursor, byte_len)?;
				Ok((bytes_to_hex(raw), cursor + byte_len))
			}
			LlNum(max) => {
				let (len, header_width) = self.read_length_header(bytes, cursor, 2)?;
				if len > max {
					return Err(self.invalid(format!("length {len} exceeds maximum {max}")));
				}
				let content_start = cursor + header_width;
				let raw = self.take(bytes, content_start, len)?;
				if !raw.iter().all(u8::is_ascii_digit) {
					return Err(self.invalid("expected numeric digits".to_owned()));
				}
				Ok((
					String::from_utf8_lossy(raw).into_owned(),
					content_start + len,
				))
			}
			LlChar(max) => {
				let (len, header_width) = self.read_length_header(bytes, cursor, 2)?;
				if len > max {
					return Err(self.invalid(format!("length {len} exceeds maximum {max}")));
				}
				let content_start = cursor + header_width;
				let raw = self.take(bytes, content_start, len)?;
				Ok((
					String::from_utf8_lossy(raw).into_owned(),
					content_start + len,
				))
			}
			LllChar(max) => {
				let (len, header_width) = self.read_length_header(bytes, cursor, 3)?;
				if len > max {
					return Err(self.invalid(format!("length {len} exceeds maximum {max}")));
				}
				let content_start = cursor + header_width;
				let raw = self.take(bytes, content_start, len)?;
				Ok((
					String::from_utf8_lossy(raw).into_owned(),
					content_start + len,
				))
			}
			LllBinary(max_bytes) => {
				let (len, header_width) = self.read_length_header(bytes, cursor, 3)?;
				if len > max_bytes {
					return Err(self.invalid(format!("length {len} exceeds maximum {max_bytes}")));
				}
				let content_start = cursor + header_width;
				let raw = self.take(bytes, content_start, len)?;
				Ok((bytes_to_hex(raw), content_start + len))
			}
		}
	}

	fn take<'a>(
		&self,
		bytes: &'a [u8],
		cursor: usize,
		len: usize,
	) -> Result<&'a [u8], FieldDecodeError> {
		bytes
			.get(cursor..cursor + len)
			.ok_or_else(|| self.invalid(format!("ran out of bytes reading {len} bytes")))
	}

	fn read_length_header(
		&self,
		bytes: &[u8],
		cursor: usize,
		width: usize,
	) -> Result<(usize, usize), FieldDecodeError> {
		let raw = self.take(bytes, cursor, width)?;
		if !raw.iter().all(u8::is_ascii_digit) {
			return Err(self.invalid("length header is not numeric".to_owned()));
		}
		let len: usize = String::from_utf8_lossy(raw)
			.parse()
			.map_err(|_| self.invalid("length header overflow".to_owned()))?;
		Ok((len, width))
	}

	fn hex_value_to_bytes(&self, value: &str, expected_bytes: usize) -> Result<Vec<u8>, FieldDecodeError> {
		if value.len() != expected_bytes * 2 {
			return Err(self.invalid(format!(
				"expected {} hex chars ({} bytes), found {}",
				expected_bytes * 2,
				expected_bytes,
				value.len()
			)));
		}
		crate::util::hex_to_bytes(value).map_err(|_| self.invalid("invalid hex value".to_owned()))
	}

	fn invalid(&self, reason: impl Into<String>) -> FieldDecodeError {
		FieldDecodeError::Invalid {
			number: self.number,
			reason: reason.into(),
		}
	}
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fixed_numeric_round_trip() {
		let def = FieldDef::new(3, FieldEncoding::FixedNumeric(6));
		let mut out = Vec::new();
		def.encode("123", &mut out).unwrap();
		assert_eq!(out, b"000123");
		let (value, consumed) = def.decode(&out, 0).unwrap();
		assert_eq!(value, "000123");
		assert_eq!(consumed, 6);
	}

	#[test]
	fn fixed_char_round_trip() {
		let def = FieldDef::new(41, FieldEncoding::FixedChar(8));
		let mut out = Vec::new();
		def.encode("TERM01", &mut out).unwrap();
		assert_eq!(out, b"TERM01  ");
		let (value, _) = def.decode(&out, 0).unwrap();
		assert_eq!(value, "TERM01");
	}

	#[test]
	fn ll_num_round_trip_at_zero_and_max() {
		let def = FieldDef::new(2, FieldEncoding::LlNum(19));
		let mut out = Vec::new();
		def.encode("", &mut out).unwrap();
		assert_eq!(out, b"00");
		let pan = "1".repeat(19);
		let mut out2 = Vec::new();
		def.encode(&pan, &mut out2).unwrap();
		let (value, consumed) = def.decode(&out2, 0).unwrap();
		assert_eq!(value, pan);
		assert_eq!(consumed, 2 + 19);
	}

	#[test]
	fn lll_char_round_trip() {
		let def = FieldDef::new(120, FieldEncoding::LllChar(999));
		let mut out = Vec::new();
		def.encode("hello world", &mut out).unwrap();
		assert_eq!(&out[..3], b"011");
		let (value, _) = def.decode(&out, 0).unwrap();
		assert_eq!(value, "hello world");
	}

	#[test]
	fn fixed_binary_round_trip() {
		let def = FieldDef::new(52, FieldEncoding::FixedBinary(8));
		let mut out = Vec::new();
		def.encode("0011223344556677", &mut out).unwrap();
		assert_eq!(out.len(), 8);
		let (value, consumed) = def.decode(&out, 0).unwrap();
		assert_eq!(value, "0011223344556677");
		assert_eq!(consumed, 8);
	}

	#[test]
	fn decode_error_on_ran_out_of_bytes() {
		let def = FieldDef::new(3, FieldEncoding::FixedNumeric(6));
		let err = def.decode(b"123", 0).unwrap_err();
		assert!(matches!(err, FieldDecodeError::Invalid { number: 3, .. }));
	}

	#[test]
	fn decode_error_on_non_numeric_where_numeric_required() {
		let def = FieldDef::new(3, FieldEncoding::FixedNumeric(6));
		let err = def.decode(b"12A456", 0).unwrap_err();
		assert!(matches!(err, FieldDecodeError::Invalid { number: 3, .. }));
	}
}

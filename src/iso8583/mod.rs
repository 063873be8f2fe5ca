//! The ISO 8583 codec (C4): message model plus pack/unpack over either
//! field dictionary.

// Modules
pub mod bitmap;
pub mod dictionary;
pub mod field;

// Uses
use std::collections::BTreeMap;

use self::{
	bitmap::{bit_is_set, decode as decode_bitmap, encode as encode_bitmap, set_bit, SECONDARY_INDICATOR},
	dictionary::Dictionary,
};
use crate::error::FieldDecodeError;

const MTI_LEN: usize = 4;

// Struct Implementation
/// An ISO 8583 message: an MTI and a sparse map of present fields. The
/// bitmap is never stored directly — it's derived from which keys are
/// present in `fields`, keeping the two always in sync by construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
	pub mti: String,
	pub fields: BTreeMap<u8, String>,
}

impl Message {
	#[must_use]
	pub fn new(mti: impl Into<String>) -> Self {
		Self {
			mti: mti.into(),
			fields: BTreeMap::new(),
		}
	}

	/// Sets field `number` to `value`, builder-style.
	#[must_use]
	pub fn with_field(mut self, number: u8, value: impl Into<String>) -> Self {
		self.fields.insert(number, value.into());
		self
	}

	#[must_use]
	pub fn field(&self, number: u8) -> Option<&str> {
		self.fields.get(&number).map(String::as_str)
	}

	pub fn set_field(&mut self, number: u8, value: impl Into<String>) {
		self.fields.insert(number, value.into());
	}
}

/// Packs `message` using `dictionary`.
pub fn pack(dictionary: &Dictionary, message: &Message) -> Result<Vec<u8>, FieldDecodeError> {
	if message.mti.len() != MTI_LEN || !message.mti.bytes().all(|b| b.is_ascii_digit()) {
		return Err(FieldDecodeError::Invalid {
			number: 0,
			reason: format!("MTI must be 4 numeric chars, found {:?}", message.mti),
		});
	}

	let mut primary = 0u64;
	let mut secondary = 0u64;
	for &number in message.fields.keys() {
		if (2..=64).contains(&number) {
			set_bit(&mut primary, number);
		} else if (65..=128).contains(&number) {
			set_bit(&mut secondary, number - 64);
		}
	}
	if secondary != 0 {
		primary |= SECONDARY_INDICATOR;
	}

	let mut out = Vec::with_capacity(64);
	out.extend(message.mti.as_bytes());
	out.extend(encode_bitmap(primary, dictionary.bitmap_encoding));
	if secondary != 0 {
		out.extend(encode_bitmap(secondary, dictionary.bitmap_encoding));
	}

	for (&number, value) in &message.fields {
		let field = dictionary
			.field(number)
			.ok_or(FieldDecodeError::UndefinedField(number))?;
		field.encode(value, &mut out)?;
	}

	Ok(out)
}

/// Unpacks `bytes` using `dictionary`. Stops and propagates at the first
/// protocol-fatal error; a partial message is never returned.
pub fn unpack(dictionary: &Dictionary, bytes: &[u8]) -> Result<Message, FieldDecodeError> {
	let mti_bytes = bytes.get(0..MTI_LEN).ok_or(FieldDecodeError::Invalid {
		number: 0,
		reason: "message shorter than the MTI".to_owned(),
	})?;
	if !mti_bytes.iter().all(u8::is_ascii_digit) {
		return Err(FieldDecodeError::Invalid {
			number: 0,
			reason: "MTI is not numeric".to_owned(),
		});
	}
	let mti = String::from_utf8_lossy(mti_bytes).into_owned();
	let mut cursor = MTI_LEN;

	let (primary, consumed) = decode_bitmap(bytes, cursor, dictionary.bitmap_encoding)?;
	cursor += consumed;

	let secondary = if primary & SECONDARY_INDICATOR != 0 {
		let (word, consumed) = decode_bitmap(bytes, cursor, dictionary.bitmap_encoding)?;
		cursor += consumed;
		word
	} else {
		0
	};

	let mut fields = BTreeMap::new();
	for number in 2..=64u8 {
		if bit_is_set(primary, number) {
			let field = dictionary
				.field(number)
				.ok_or(FieldDecodeError::UndefinedField(number))?;
			let (value, new_cursor) = field.decode(bytes, cursor)?;
			cursor = new_cursor;
			fields.insert(number, value);
		}
	}
	if secondary != 0 {
		for local in 1..=64u8 {
			if bit_is_set(secondary, local) {
				let number = local + 64;
				let field = dictionary
					.field(number)
					.ok_or(FieldDecodeError::UndefinedField(number))?;
				let (value, new_cursor) = field.decode(bytes, cursor)?;
				cursor = new_cursor;
				fields.insert(number, value);
			}
		}
	}

	Ok(Message { mti, fields })
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;
	use crate::iso8583::dictionary::{bank, pos};

	#[test]
	fn field_53_key_change_reference_round_trips() {
		// Field 53 carries `KEY_ID:<id>`/`STATUS:...` text in the
		// network-management flow (spec §4.8), not the base num(16)
		// security-control-info it's nominally defined as.
		let msg = Message::new("0810").with_field(53, "KEY_ID:NEWTID01-1234567890123456789");
		let wire = pack(pos(), &msg).unwrap();
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn pack_unpack_round_trip_pos() {
		let msg = Message::new("0200")
			.with_field(2, "4532015112830366")
			.with_field(3, "000000")
			.with_field(4, "000000005000")
			.with_field(11, "000123")
			.with_field(41, "TERM0001");

		let wire = pack(pos(), &msg).unwrap();
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn pack_unpack_round_trip_bank() {
		let msg = Message::new("0200").with_field(4, "000000012345").with_field(126, "x".repeat(500));
		let wire = pack(bank(), &msg).unwrap();
		let decoded = unpack(bank(), &wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn field_below_64_alone_does_not_trigger_secondary_bitmap() {
		let msg = Message::new("0800").with_field(49, "840");
		let wire = pack(pos(), &msg).unwrap();
		let (primary, _) = bitmap::decode(&wire, 4, pos().bitmap_encoding).unwrap();
		assert_eq!(primary & SECONDARY_INDICATOR, 0);
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn field_65_triggers_secondary_bitmap() {
		// No field 65 is defined in either dictionary, so exercise the
		// secondary-bitmap boundary directly against the bitmap module
		// instead (see iso8583::bitmap tests) and confirm field 126 (which
		// lives past bit 64) round-trips through the secondary bitmap path.
		let msg = Message::new("0800").with_field(126, "hi");
		let wire = pack(pos(), &msg).unwrap();
		let (primary, _) = bitmap::decode(&wire, 4, pos().bitmap_encoding).unwrap();
		assert_ne!(primary & SECONDARY_INDICATOR, 0);
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded, msg);
	}

	#[test]
	fn undefined_field_in_bitmap_is_rejected() {
		// Field 200 isn't representable in a 128-bit two-word bitmap at
		// all; instead construct a message whose bitmap references field 65
		// (undefined in both dictionaries) by packing manually.
		let mti = b"0800";
		let mut primary = 0u64;
		set_bit(&mut primary, 49); // arbitrary defined field, to keep things simple
		let mut bytes = Vec::new();
		bytes.extend(mti);
		bytes.extend(encode_bitmap(primary | SECONDARY_INDICATOR, pos().bitmap_encoding));
		let mut secondary = 0u64;
		set_bit(&mut secondary, 1); // field 65, undefined
		bytes.extend(encode_bitmap(secondary, pos().bitmap_encoding));
		bytes.extend(b"ABC"); // field 49 value

		let err = unpack(pos(), &bytes).unwrap_err();
		assert!(matches!(err, FieldDecodeError::UndefinedField(49 | 65)));
	}

	#[test]
	fn variable_length_field_at_zero_length() {
		let msg = Message::new("0800").with_field(2, "");
		let wire = pack(pos(), &msg).unwrap();
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded.field(2), Some(""));
	}

	#[test]
	fn variable_length_field_at_max_length() {
		let pan19 = "1".repeat(19);
		let msg = Message::new("0200").with_field(2, pan19.clone());
		let wire = pack(pos(), &msg).unwrap();
		let decoded = unpack(pos(), &wire).unwrap();
		assert_eq!(decoded.field(2), Some(pan19.as_str()));
	}
}

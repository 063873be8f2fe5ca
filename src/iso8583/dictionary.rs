//! The two field dictionaries: POS (ASCII-hex bitmap) and Bank
//! (binary-packed bitmap). Both are built once and shared read-only for the
//! lifetime of the process; neither mutates after construction.

// Uses
use std::{collections::HashMap, sync::OnceLock};

use crate::iso8583::{
	bitmap::BitmapEncoding,
	field::{FieldDef, FieldEncoding},
};

// Struct Implementation
/// A field-dictionary: a bitmap encoding plus a lookup from field number to
/// its encoding rule.
pub struct Dictionary {
	pub bitmap_encoding: BitmapEncoding,
	fields: HashMap<u8, FieldDef>,
}

impl Dictionary {
	fn new(bitmap_encoding: BitmapEncoding, defs: Vec<FieldDef>) -> Self {
		Self {
			bitmap_encoding,
			fields: defs.into_iter().map(|d| (d.number, d)).collect(),
		}
	}

	/// Looks up the encoding rule for `number`, or `None` if this dictionary
	/// has no entry for it.
	#[must_use]
	pub fn field(&self, number: u8) -> Option<&FieldDef> {
		self.fields.get(&number)
	}
}

#[rustfmt::skip]
fn pos_field_defs() -> Vec<FieldDef> {
	use FieldEncoding::{FixedBinary, FixedChar, FixedNumeric, LlChar, LlNum, LllBinary, LllChar};
	vec![
		FieldDef::new(2,  LlNum(19)),
		FieldDef::new(3,  FixedNumeric(6)),
		FieldDef::new(4,  FixedNumeric(12)),
		FieldDef::new(7,  FixedNumeric(10)),
		FieldDef::new(11, FixedNumeric(6)),
		FieldDef::new(12, FixedNumeric(6)),
		FieldDef::new(13, FixedNumeric(4)),
		FieldDef::new(14, FixedNumeric(4)),
		FieldDef::new(22, FixedNumeric(3)),
		FieldDef::new(25, FixedNumeric(2)),
		FieldDef::new(35, LlChar(37)),
		FieldDef::new(37, FixedChar(12)),
		FieldDef::new(38, FixedChar(6)),
		FieldDef::new(39, FixedChar(2)),
		FieldDef::new(41, FixedChar(8)),
		FieldDef::new(42, FixedChar(15)),
		FieldDef::new(43, FixedChar(40)),
		FieldDef::new(49, FixedChar(3)),
		FieldDef::new(52, FixedBinary(8)),
		// Nominally num(16) security-control-info per the base ISO 8583
		// definition, but the gateway's own network-management flow (spec
		// §4.8) overloads this field with `KEY_ID:<id>`/`STATUS:...` text
		// that's neither numeric nor 16 chars; LLL-char accommodates both.
		FieldDef::new(53, LllChar(999)),
		FieldDef::new(55, LllBinary(255)),
		FieldDef::new(90, FixedChar(42)),
		FieldDef::new(120, LllChar(999)),
		FieldDef::new(126, LllChar(999)),
	]
}

/// The Bank dictionary shares field semantics with POS and differs only in
/// bitmap encoding; no field in this table carries a BCD override, so field
/// encodings are carried over unchanged (see DESIGN.md).
fn bank_field_defs() -> Vec<FieldDef> {
	pos_field_defs()
}

/// The POS-facing field dictionary: ASCII-hex bitmap.
#[must_use]
pub fn pos() -> &'static Dictionary {
	static POS: OnceLock<Dictionary> = OnceLock::new();
	POS.get_or_init(|| Dictionary::new(BitmapEncoding::AsciiHex, pos_field_defs()))
}

/// The Bank-facing field dictionary: binary-packed bitmap.
#[must_use]
pub fn bank() -> &'static Dictionary {
	static BANK: OnceLock<Dictionary> = OnceLock::new();
	BANK.get_or_init(|| Dictionary::new(BitmapEncoding::Binary, bank_field_defs()))
}

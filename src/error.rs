//! The error enum definitions used across the gateway.
//!
//! Each concern gets its own error type so call sites can match on exactly
//! the failures that can occur there; [`GatewayError`] composes them and is
//! the type [`crate::router`] maps to a POS response code.

// Uses
use std::borrow::Cow;

use thiserror::Error;

// Struct Implementation
/// Errors from the TDES/PIN-block cryptographic core (C1).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CryptoError {
	#[error("invalid hex string: {0}")]
	InvalidHex(String),
	#[error("invalid length: expected {expected} hex chars, found {found}")]
	InvalidLength { expected: usize, found: usize },
	#[error("decoded PIN length out of range: {0} (must be 4..12)")]
	PinLengthOutOfRange(usize),
}

/// Errors from PIN transposition (C2).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TranspositionError {
	#[error(transparent)]
	Crypto(#[from] CryptoError),
	#[error("pin block is all zero")]
	ZeroPinBlock,
	#[error("pan too short: {0} digits, need at least 12")]
	PanTooShort(usize),
}

/// Errors from field decoding in the ISO 8583 codec (C4).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FieldDecodeError {
	#[error("field {number}: {reason}")]
	Invalid { number: u8, reason: String },
	#[error("bitmap references undefined field {0}")]
	UndefinedField(u8),
}

/// Errors from deframing/framing the wire protocols (C5).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FramingError {
	#[error("frame length {0} exceeds maximum of {1}")]
	FrameTooLarge(usize, usize),
	#[error("connection closed while reading frame")]
	ConnectionClosed,
	#[error("malformed length header: {0}")]
	MalformedLength(String),
	#[error("io error: {0}")]
	Io(String),
}

/// Errors from the in-process terminal/key repository (C6).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RepositoryError {
	#[error("terminal id must not be empty")]
	EmptyTerminalId,
	#[error("terminal {0} not found")]
	TerminalNotFound(String),
	#[error("key value collides with an existing key")]
	KeyValueCollision,
	#[error("could not generate a unique key after {0} attempts")]
	KeyGenerationExhausted(usize),
}

/// Errors from the key-change protocol (C7).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum KeyChangeError {
	#[error(transparent)]
	Repository(#[from] RepositoryError),
	#[error("key change is disabled, or auto-creation is disabled and the terminal does not exist")]
	NotPermitted,
}

/// The unified taxonomy a POS response is derived from (spec §7).
#[derive(Clone, Debug, Error)]
pub enum GatewayError {
	/// Bad length prefix or oversize frame; no reply is sent, the
	/// connection is simply closed.
	#[error(transparent)]
	Framing(#[from] FramingError),
	/// A specific field failed to decode.
	#[error(transparent)]
	FieldDecode(#[from] FieldDecodeError),
	/// The PAN failed Luhn or brand detection.
	#[error("card validation failed: {0}")]
	CardInvalid(String),
	/// A PIN block or PIN transposition failure.
	#[error(transparent)]
	Pin(#[from] TranspositionError),
	/// A business rule (amount cap, unknown processing code) declined the
	/// transaction locally.
	#[error("declined: {code} ({reason})")]
	BusinessDecline { code: &'static str, reason: String },
	/// The bank never responded within the deadline.
	#[error("bank timeout")]
	BankTimeout,
	/// The bank responded with a decline; `code` is the bank's verbatim
	/// field 39.
	#[error("bank declined: {0}")]
	BankDecline(String),
	/// The in-process repository failed.
	#[error(transparent)]
	Repository(#[from] RepositoryError),
	/// The MTI has no route.
	#[error("unsupported MTI: {0}")]
	UnsupportedMti(String),
}

impl GatewayError {
	/// Maps this error to the POS response code it produces, per spec §7.
	#[must_use]
	pub fn response_code(&self) -> Cow<'static, str> {
		match self {
			Self::FieldDecode(_) => Cow::Borrowed("30"),
			Self::CardInvalid(_) => Cow::Borrowed("14"),
			Self::Pin(_) => Cow::Borrowed("96"),
			Self::BusinessDecline { code, .. } => Cow::Borrowed(*code),
			Self::BankTimeout => Cow::Borrowed("91"),
			Self::BankDecline(code) => Cow::Owned(code.clone()),
			Self::Repository(_) => Cow::Borrowed("96"),
			Self::UnsupportedMti(_) => Cow::Borrowed("12"),
			// Framing errors never reach here in practice; the session
			// closes without a reply before a response code is needed.
			Self::Framing(_) => Cow::Borrowed("96"),
		}
	}
}

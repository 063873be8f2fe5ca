//! The response-code service (C10): POS- and Bank-facing code tables with
//! their description, severity, category and recommended action. Built
//! once behind a [`std::sync::OnceLock`], the same pattern the field
//! dictionaries use (C4).
//!
//! Several codes fall into more than one category set at once (e.g. "72" is
//! listed under both system errors and PIN errors; "75"/"81"/"83" under
//! both PIN and security errors). Since a code can only carry one
//! [`Category`] in this table, ties are broken by specificity:
//! `Pin`/`Security`/`Card`/`Account`/`Business` outrank the broad `System`
//! bucket, which in turn outranks `Unknown` (see DESIGN.md).

// Uses
use std::{collections::HashMap, sync::OnceLock};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
	Info,
	Warning,
	Error,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Category {
	Success,
	SystemError,
	CardError,
	PinError,
	AccountError,
	SecurityError,
	BusinessError,
	Unknown,
}

#[derive(Clone, Copy, Debug)]
pub struct CodeInfo {
	pub code: &'static str,
	pub description: &'static str,
	pub severity: Severity,
	pub category: Category,
	pub recommended_action: &'static str,
}

/// Whether `code` is one of the gateway's defined success codes (spec
/// §4.10: `{"00", "10", "11"}`).
#[must_use]
pub fn is_success(code: &str) -> bool {
	matches!(code, "00" | "10" | "11")
}

/// Expands to a `[CodeInfo; N]` array literal; callers turn it into a table
/// with `.into_iter().map(|info| (info.code, info)).collect()`.
macro_rules! code_table {
	($($code:literal => ($description:literal, $severity:ident, $category:ident, $action:literal)),* $(,)?) => {
		[$(
			CodeInfo {
				code: $code,
				description: $description,
				severity: Severity::$severity,
				category: Category::$category,
				recommended_action: $action,
			},
		)*]
	};
}

#[rustfmt::skip]
fn pos_table() -> &'static HashMap<&'static str, CodeInfo> {
	use Category::{AccountError, BusinessError, CardError, PinError, SecurityError, Success, SystemError};
	use Severity::{Error, Info, Warning};
	static TABLE: OnceLock<HashMap<&'static str, CodeInfo>> = OnceLock::new();
	TABLE.get_or_init(|| {
		code_table! {
			"00" => ("Approved",                        Info,    Success,       "none"),
		"10" => ("Approved, partial amount",         Info,    Success,       "none"),
		"11" => ("Approved, VIP",                    Info,    Success,       "none"),
		"04" => ("Pickup card",                      Warning, CardError,     "retain card if possible"),
		"12" => ("Invalid transaction",               Error,   SystemError,  "correct the request and resubmit"),
		"13" => ("Invalid amount",                   Error,   BusinessError, "correct the amount and resubmit"),
		"14" => ("Invalid card number",              Error,   CardError,     "reject, do not retry"),
		"15" => ("No such issuer",                   Error,   AccountError,  "reject, do not retry"),
		"30" => ("Format error",                     Error,   SystemError,  "correct the request and resubmit"),
		"41" => ("Lost card",                        Warning, CardError,     "retain card if possible"),
		"43" => ("Stolen card",                      Warning, CardError,     "retain card if possible"),
		"51" => ("Insufficient funds",               Warning, BusinessError, "inform cardholder"),
		"54" => ("Expired card",                     Warning, CardError,     "inform cardholder"),
		"55" => ("Incorrect PIN",                    Warning, PinError,      "inform cardholder"),
		"56" => ("No card record",                   Error,   AccountError,  "reject, do not retry"),
		"57" => ("Transaction not permitted to cardholder", Warning, BusinessError, "inform cardholder"),
		"58" => ("Transaction not permitted to terminal",   Error,   SystemError,  "check terminal configuration"),
		"59" => ("Suspected fraud",                  Error,   SecurityError, "reject, escalate"),
		"61" => ("Exceeds withdrawal limit",         Warning, BusinessError, "inform cardholder"),
		"62" => ("Restricted card",                  Warning, PinError,      "inform cardholder"),
		"63" => ("Security violation",               Error,   SecurityError, "reject, escalate"),
		"65" => ("Activity count limit exceeded",    Warning, BusinessError, "inform cardholder"),
		"67" => ("Hard capture",                     Warning, PinError,      "retain card if possible"),
		"72" => ("PIN data required but missing",    Error,   PinError,      "correct the request and resubmit"),
		"73" => ("Expired promotion code",           Warning, BusinessError, "inform cardholder"),
		"74" => ("Invalid account type",             Error,   AccountError,  "correct the request and resubmit"),
		"75" => ("PIN tries exceeded",               Warning, PinError,      "inform cardholder"),
		"78" => ("No account associated with the card", Error, SecurityError, "reject, do not retry"),
		"80" => ("Invalid expiration date",          Error,   SecurityError, "correct the request and resubmit"),
		"81" => ("PIN cryptographic error",          Error,   PinError,      "contact support"),
		"82" => ("Negative CVV/CVC result",          Error,   SecurityError, "reject, escalate"),
		"83" => ("Cannot verify PIN",                Error,   PinError,      "contact support"),
		"84" => ("Invalid authorisation life cycle", Error,   SecurityError, "contact support"),
		"85" => ("No reason to decline (CVV only)",  Info,    SecurityError, "none"),
		"90" => ("Cutoff is in progress",            Error,   SystemError,  "retry later"),
		"91" => ("Issuer or switch unavailable",     Error,   SystemError,  "retry later"),
		"92" => ("Unable to route transaction",      Error,   SystemError,  "contact support"),
		"93" => ("Violation of law",                 Error,   SystemError,  "reject, do not retry"),
		"94" => ("Duplicate transmission",           Warning, SystemError,  "none, already processed"),
		"95" => ("Reconciliation error",             Error,   SystemError,  "contact support"),
		"96" => ("System malfunction",               Error,   SystemError,  "contact support"),
		"97" => ("Reserved for national use",        Error,   SystemError,  "contact support"),
		"98" => ("Reserved for national use",        Error,   SystemError,  "contact support"),
		"99" => ("Reserved for private use",         Error,   SystemError,  "contact support"),
		}
		.into_iter()
		.map(|info| (info.code, info))
		.collect()
	})
}

/// The bank-facing table; it shares the numeric range with the POS table
/// plus a handful of alpha codes the bank host may return.
#[rustfmt::skip]
fn bank_table() -> &'static HashMap<&'static str, CodeInfo> {
	use Category::{BusinessError, PinError, SystemError};
	use Severity::{Error, Warning};
	static TABLE: OnceLock<HashMap<&'static str, CodeInfo>> = OnceLock::new();
	TABLE.get_or_init(|| {
		let mut table = pos_table().clone();
		table.extend(
			code_table! {
				"B1" => ("Surcharge amount not permitted", Warning, BusinessError, "inform cardholder"),
				"N0" => ("Forced post declined",           Warning, BusinessError, "inform cardholder"),
				"N3" => ("Cash service not available",     Warning, BusinessError, "inform cardholder"),
				"P2" => ("Invalid biller information",     Error,   SystemError,  "correct the request and resubmit"),
				"Z3" => ("Unable to go online, decline",   Error,   PinError,      "retry online"),
			}
			.into_iter()
			.map(|info| (info.code, info)),
		);
		table
	})
}

/// Looks up `code` in the POS-facing response-code table.
#[must_use]
pub fn lookup(code: &str) -> Option<CodeInfo> {
	pos_table().get(code).copied()
}

/// Looks up `code` in the bank-facing response-code table (POS codes plus
/// the bank's alpha-numeric extensions).
#[must_use]
pub fn lookup_bank(code: &str) -> Option<CodeInfo> {
	bank_table().get(code).copied()
}

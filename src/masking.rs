//! The masking logger interface (C11): applies the field-masking policy of
//! spec §4.11 to a message before it is ever handed to a `tracing` sink.
//! Nothing upstream of [`masked_summary`] should log a [`Message`] directly.

// Uses
use crate::iso8583::Message;

/// Fields fully replaced with `'*' * len`, except PAN which keeps its
/// first 4 and last 4 digits visible (reuses C3's masking rule).
const FULLY_MASKED: &[u8] = &[2, 14, 35, 45, 55, 120, 126];

/// Fields with only their first/last few characters visible.
const PARTIALLY_MASKED: &[u8] = &[37, 41, 42];

/// The PIN field is never rendered, under any policy.
const WIPED: &[u8] = &[52];

fn mask_fully(number: u8, value: &str) -> String {
	if number == 2 {
		crate::card::validator::mask_pan(value)
	} else {
		"*".repeat(value.len())
	}
}

fn mask_partially(value: &str) -> String {
	let len = value.len();
	if len <= 4 {
		return "*".repeat(len);
	}
	let visible = 2.min(len / 2);
	format!(
		"{}{}{}",
		&value[..visible],
		"*".repeat(len - visible * 2),
		&value[len - visible..]
	)
}

/// Produces a masked, human-readable field-by-field summary of `message`
/// suitable for a `tracing` event. This is the only place a [`Message`]'s
/// field values are rendered for logging.
#[must_use]
pub fn masked_summary(message: &Message) -> String {
	let mut parts = vec![format!("mti={}", message.mti)];
	for (&number, value) in &message.fields {
		if WIPED.contains(&number) {
			continue;
		}
		let rendered = if FULLY_MASKED.contains(&number) {
			mask_fully(number, value)
		} else if PARTIALLY_MASKED.contains(&number) {
			mask_partially(value)
		} else {
			value.clone()
		};
		parts.push(format!("f{number}={rendered}"));
	}
	parts.join(" ")
}

//! The key-change protocol (C7): generates a fresh terminal key, computes
//! its KCV, and rotates it into the store atomically.

// Uses
use std::{
	sync::Arc,
	time::{Duration, SystemTime},
};

use rand::RngCore;

use crate::{
	crypto::tdes,
	error::KeyChangeError,
	store::{Key, KeyStatus, Terminal, TerminalKeyStore},
	util::bytes_to_hex,
};

const MAX_GENERATION_ATTEMPTS: usize = 10;
const SECONDS_PER_DAY: u64 = 86_400;

/// The options spec §6's `terminal.*` configuration keys control: whether
/// terminals may be auto-provisioned on first key change, whether the
/// protocol is enabled at all, the TDES key length to generate (2 = EDE-2 /
/// 32 hex chars, 3 = EDE-3 / 48 hex chars), and the expiry horizon for
/// freshly-generated keys.
#[derive(Clone, Copy, Debug)]
pub struct KeyChangeConfig {
	pub enabled: bool,
	pub auto_create: bool,
	pub key_length: u8,
	pub key_expiry_days: u32,
}

/// The outcome of a successful key change, carrying everything a C8/C9
/// caller needs to report back to the terminal (spec §4.7).
#[derive(Clone, Debug)]
pub struct KeyChangeResult {
	pub terminal_id: String,
	pub key_id: String,
	pub key_value: String,
	pub kcv: String,
	pub key_change_count: u32,
}

/// Generates a candidate key of `byte_len` bytes (16 for double-length
/// TDES) and its KCV, retrying on value collision with the existing key
/// set up to [`MAX_GENERATION_ATTEMPTS`] times.
async fn generate_candidate(
	store: &dyn TerminalKeyStore,
	byte_len: usize,
) -> Result<(String, String), KeyChangeError> {
	let mut rng = rand::thread_rng();
	for _ in 0..MAX_GENERATION_ATTEMPTS {
		let mut buf = vec![0u8; byte_len];
		rng.fill_bytes(&mut buf);
		let value = bytes_to_hex(&buf);
		if store.exists_key_value(&value).await {
			continue;
		}
		let kcv = tdes::kcv(&value).expect("freshly generated 16-byte key has the expected KCV input length");
		return Ok((value, kcv));
	}
	Err(crate::error::RepositoryError::KeyGenerationExhausted(MAX_GENERATION_ATTEMPTS).into())
}

/// Runs a key change for `terminal_id`. If the terminal doesn't exist and
/// `config.auto_create` is true, it's created first (spec §4.7: "terminals
/// may be auto-provisioned on first key change if configured to allow it");
/// otherwise an unknown terminal is rejected. Rejected outright if
/// `config.enable_key_change` is false (spec §6: `terminal.enable_key_change`).
pub async fn change_key(
	store: &Arc<dyn TerminalKeyStore>,
	terminal_id: &str,
	config: KeyChangeConfig,
) -> Result<KeyChangeResult, KeyChangeError> {
	if !config.enabled {
		return Err(KeyChangeError::NotPermitted);
	}
	if terminal_id.is_empty() {
		return Err(crate::error::RepositoryError::EmptyTerminalId.into());
	}

	if !store.exists_terminal(terminal_id).await {
		if !config.auto_create {
			return Err(KeyChangeError::NotPermitted);
		}
		store.save_terminal(Terminal::new(terminal_id)).await?;
	}

	// `key_length` is 2 (EDE-2) or 3 (EDE-3) double/triple-length TDES key
	// parts, i.e. 16 or 24 raw bytes (spec §3: Key.value is "32 or 48 hex
	// chars").
	let byte_len = usize::from(config.key_length) * 8;
	let (value, kcv) = generate_candidate(store.as_ref(), byte_len).await?;
	let now = SystemTime::now();
	let key_id = format!(
		"{terminal_id}-{}",
		now.duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
	);
	let expiry = (config.key_expiry_days > 0)
		.then(|| now + Duration::from_secs(u64::from(config.key_expiry_days) * SECONDS_PER_DAY));
	let key = Key {
		key_id: key_id.clone(),
		value,
		key_type: "TDES".to_owned(),
		status: KeyStatus::Active,
		kcv: kcv.clone(),
		length: config.key_length,
		created: now,
		expiry,
		notes: Vec::new(),
	};

	let (terminal, key) = store.rotate_key(terminal_id, key).await?;

	Ok(KeyChangeResult {
		terminal_id: terminal.terminal_id,
		key_id: key.key_id,
		key_value: key.value,
		kcv: key.kcv,
		key_change_count: terminal.key_change_count,
	})
}

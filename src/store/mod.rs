//! The terminal/key store (C6): entities, the repository trait, and the
//! in-memory implementation satisfying it.

// Modules
pub mod memory;

// Uses
use std::time::SystemTime;

use async_trait::async_trait;

use crate::error::RepositoryError;

// Struct Implementation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TerminalStatus {
	Active,
	Inactive,
	Suspended,
	Maintenance,
	Decommissioned,
}

#[derive(Clone, Debug)]
pub struct Terminal {
	pub terminal_id: String,
	pub merchant_id: Option<String>,
	pub status: TerminalStatus,
	pub terminal_type: String,
	pub created: SystemTime,
	pub updated: SystemTime,
	pub last_activity: Option<SystemTime>,
	pub last_key_change: Option<SystemTime>,
	pub key_change_count: u32,
	pub key_ref: Option<String>,
}

impl Terminal {
	#[must_use]
	pub fn new(terminal_id: impl Into<String>) -> Self {
		let now = SystemTime::now();
		Self {
			terminal_id: terminal_id.into(),
			merchant_id: None,
			status: TerminalStatus::Active,
			terminal_type: "POS".to_owned(),
			created: now,
			updated: now,
			last_activity: None,
			last_key_change: None,
			key_change_count: 0,
			key_ref: None,
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyStatus {
	Active,
	Inactive,
	Expired,
	Compromised,
	Pending,
}

#[derive(Clone, Debug)]
pub struct Key {
	pub key_id: String,
	pub value: String,
	pub key_type: String,
	pub status: KeyStatus,
	pub kcv: String,
	pub length: u8,
	pub created: SystemTime,
	pub expiry: Option<SystemTime>,
	pub notes: Vec<String>,
}

/// The in-process entity repository abstraction. Mutating operations that
/// must be atomic (key-rotation) are exposed as a single call rather than a
/// read-then-write pair, so implementations can hold one write guard for
/// the whole operation.
#[async_trait]
pub trait TerminalKeyStore: Send + Sync {
	async fn find_terminal(&self, terminal_id: &str) -> Option<Terminal>;
	async fn exists_terminal(&self, terminal_id: &str) -> bool;
	async fn save_terminal(&self, terminal: Terminal) -> Result<Terminal, RepositoryError>;

	async fn find_key(&self, key_id: &str) -> Option<Key>;
	async fn exists_key_value(&self, value: &str) -> bool;
	async fn save_key(&self, key: Key) -> Result<Key, RepositoryError>;

	async fn active_terminals(&self) -> Vec<Terminal>;
	async fn terminals_lacking_keys(&self) -> Vec<Terminal>;

	/// Terminals whose current key (per `key_ref`) has an `expiry` in the
	/// past.
	async fn terminals_with_expired_keys(&self) -> Vec<Terminal>;

	/// Keys whose `expiry` falls within `window` of now, inclusive.
	async fn keys_expiring_in_window(&self, window: std::time::Duration) -> Vec<Key>;

	/// Key values shared by more than one `Key` record. Ordinary operation
	/// never produces any (`save_key`/`rotate_key` reject collisions), so a
	/// non-empty result indicates the uniqueness invariant was bypassed.
	async fn duplicate_key_values(&self) -> Vec<Key>;

	/// Atomically rotates `terminal_id`'s current key: saves `new_key`,
	/// deactivates the terminal's previous key (if any) with an audit note,
	/// sets `terminal.key_ref`, and increments `key_change_count`. Returns
	/// the updated terminal and the newly active key.
	async fn rotate_key(
		&self,
		terminal_id: &str,
		new_key: Key,
	) -> Result<(Terminal, Key), RepositoryError>;
}

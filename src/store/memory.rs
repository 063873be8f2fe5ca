//! An in-memory [`TerminalKeyStore`], guarded by a single `RwLock` so
//! [`InMemoryStore::rotate_key`] can hold one write guard across both the
//! key insert and the terminal update, so key rotation is atomic.

// Uses
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Key, Terminal, TerminalKeyStore, TerminalStatus};
use crate::error::RepositoryError;

#[derive(Default)]
struct Tables {
	terminals: HashMap<String, Terminal>,
	keys: HashMap<String, Key>,
}

/// The process-local terminal/key store. Cheap to clone behind an `Arc`;
/// holds no connections and never touches disk.
#[derive(Default)]
pub struct InMemoryStore {
	tables: RwLock<Tables>,
}

impl InMemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl TerminalKeyStore for InMemoryStore {
	async fn find_terminal(&self, terminal_id: &str) -> Option<Terminal> {
		self.tables.read().await.terminals.get(terminal_id).cloned()
	}

	async fn exists_terminal(&self, terminal_id: &str) -> bool {
		self.tables.read().await.terminals.contains_key(terminal_id)
	}

	async fn save_terminal(&self, terminal: Terminal) -> Result<Terminal, RepositoryError> {
		if terminal.terminal_id.is_empty() {
			return Err(RepositoryError::EmptyTerminalId);
		}
		let mut tables = self.tables.write().await;
		tables
			.terminals
			.insert(terminal.terminal_id.clone(), terminal.clone());
		Ok(terminal)
	}

	async fn find_key(&self, key_id: &str) -> Option<Key> {
		self.tables.read().await.keys.get(key_id).cloned()
	}

	async fn exists_key_value(&self, value: &str) -> bool {
		self.tables.read().await.keys.values().any(|k| k.value == value)
	}

	async fn save_key(&self, key: Key) -> Result<Key, RepositoryError> {
		let mut tables = self.tables.write().await;
		if tables
			.keys
			.values()
			.any(|existing| existing.key_id != key.key_id && existing.value == key.value)
		{
			return Err(RepositoryError::KeyValueCollision);
		}
		tables.keys.insert(key.key_id.clone(), key.clone());
		Ok(key)
	}

	async fn active_terminals(&self) -> Vec<Terminal> {
		self.tables
			.read()
			.await
			.terminals
			.values()
			.filter(|t| t.status == TerminalStatus::Active)
			.cloned()
			.collect()
	}

	async fn terminals_lacking_keys(&self) -> Vec<Terminal> {
		self.tables
			.read()
			.await
			.terminals
			.values()
			.filter(|t| t.key_ref.is_none())
			.cloned()
			.collect()
	}

	async fn terminals_with_expired_keys(&self) -> Vec<Terminal> {
		let tables = self.tables.read().await;
		let now = std::time::SystemTime::now();
		tables
			.terminals
			.values()
			.filter(|t| {
				t.key_ref
					.as_ref()
					.and_then(|key_id| tables.keys.get(key_id))
					.and_then(|key| key.expiry)
					.is_some_and(|expiry| expiry <= now)
			})
			.cloned()
			.collect()
	}

	async fn keys_expiring_in_window(&self, window: std::time::Duration) -> Vec<Key> {
		let now = std::time::SystemTime::now();
		let horizon = now + window;
		self.tables
			.read()
			.await
			.keys
			.values()
			.filter(|k| k.expiry.is_some_and(|expiry| expiry > now && expiry <= horizon))
			.cloned()
			.collect()
	}

	async fn duplicate_key_values(&self) -> Vec<Key> {
		let tables = self.tables.read().await;
		let mut by_value: HashMap<&str, Vec<&Key>> = HashMap::new();
		for key in tables.keys.values() {
			by_value.entry(key.value.as_str()).or_default().push(key);
		}
		by_value
			.into_values()
			.filter(|keys| keys.len() > 1)
			.flatten()
			.cloned()
			.collect()
	}

	async fn rotate_key(
		&self,
		terminal_id: &str,
		new_key: Key,
	) -> Result<(Terminal, Key), RepositoryError> {
		let mut tables = self.tables.write().await;
		if tables
			.keys
			.values()
			.any(|existing| existing.key_id != new_key.key_id && existing.value == new_key.value)
		{
			return Err(RepositoryError::KeyValueCollision);
		}
		let mut terminal = tables
			.terminals
			.get(terminal_id)
			.cloned()
			.ok_or_else(|| RepositoryError::TerminalNotFound(terminal_id.to_owned()))?;

		if let Some(old_key_id) = terminal.key_ref.take() {
			if let Some(old_key) = tables.keys.get_mut(&old_key_id) {
				old_key.status = crate::store::KeyStatus::Inactive;
				old_key.notes.push(format!("superseded by {}", new_key.key_id));
			}
		}

		terminal.key_ref = Some(new_key.key_id.clone());
		terminal.last_key_change = Some(new_key.created);
		terminal.key_change_count += 1;
		terminal.updated = new_key.created;

		tables.keys.insert(new_key.key_id.clone(), new_key.clone());
		tables.terminals.insert(terminal_id.to_owned(), terminal.clone());

		Ok((terminal, new_key))
	}
}

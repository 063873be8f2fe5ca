//! The transaction router (C8): MTI dispatch, field validation, PIN
//! transposition, business caps, bank forwarding, and response composition,
//! per spec §4.8.

// Modules
pub mod duplicate;

// Uses
use std::{sync::Arc, time::SystemTime};

use rand::Rng;
use tracing::{info, warn};

use self::duplicate::DuplicateCache;
use crate::{
	card::validator,
	codes,
	crypto::transposition,
	dispatcher::BankForwarder,
	error::{GatewayError, RepositoryError},
	iso8583::Message,
	keychange,
	store::{Terminal, TerminalKeyStore, TerminalStatus},
	util::now_ms,
};

/// Fields copied from request to response verbatim when present (spec
/// §4.8 step 6); F37 is minted separately, F38 only on approval.
const RESPONSE_COPY_FIELDS: &[u8] = &[2, 3, 4, 11, 12, 13, 14, 22, 25, 41, 42, 43, 49];

#[derive(Clone, Debug)]
pub struct RouterConfig {
	pub gateway_zonal_key: String,
	pub default_terminal_key: String,
	pub enable_pin_transposition: bool,
	pub enable_card_validation: bool,
	pub reject_invalid_card: bool,
	pub auto_create_terminal: bool,
	pub enable_key_change: bool,
	pub key_length: u8,
	pub key_expiry_days: u32,
}

pub struct TransactionRouter {
	store: Arc<dyn TerminalKeyStore>,
	bank: Arc<dyn BankForwarder>,
	duplicates: DuplicateCache,
	config: RouterConfig,
}

/// A 12-digit RRN minted from the current time (spec §4.8: "gateway mints
/// one as `now_ms mod 10^12`, zero-padded").
#[must_use]
pub fn mint_rrn() -> String {
	format!("{:012}", now_ms() % 1_000_000_000_000)
}

fn mint_auth_code() -> String {
	let mut rng = rand::thread_rng();
	format!("{:06}", rng.gen_range(0..1_000_000u32))
}

fn reply_mti(request_mti: &str) -> Option<&'static str> {
	match request_mti {
		"0100" => Some("0110"),
		"0200" => Some("0210"),
		"0400" => Some("0410"),
		"0800" => Some("0810"),
		_ => None,
	}
}

fn build_response(request: &Message, reply_mti: &str, code: &str) -> Message {
	let mut response = Message::new(reply_mti);
	for &number in RESPONSE_COPY_FIELDS {
		if let Some(value) = request.field(number) {
			response.set_field(number, value.to_owned());
		}
	}
	response.set_field(39, code);
	response.set_field(37, mint_rrn());
	if codes::is_success(code) {
		response.set_field(38, mint_auth_code());
	}
	response
}

/// Applies the processing-code-dependent approval caps (spec §4.8 step 4).
fn apply_business_caps(processing_code: &str, amount: u64) -> &'static str {
	match processing_code {
		"000000" => {
			if amount > 100_000 {
				"61"
			} else {
				"00"
			}
		}
		"010000" => {
			if amount > 50_000 {
				"61"
			} else {
				"00"
			}
		}
		"200000" | "310000" | "400000" | "500000" => {
			if amount <= 1_000_000 {
				"00"
			} else {
				"61"
			}
		}
		_ => "12",
	}
}

impl TransactionRouter {
	#[must_use]
	pub fn new(store: Arc<dyn TerminalKeyStore>, bank: Arc<dyn BankForwarder>, config: RouterConfig) -> Self {
		Self {
			store,
			bank,
			duplicates: DuplicateCache::new(),
			config,
		}
	}

	/// Routes one decoded POS request to completion, returning the response
	/// to write back, or `None` for advices that draw no reply (spec §4.8).
	pub async fn process(&self, request: &Message) -> Option<Message> {
		match request.mti.as_str() {
			"0100" | "0200" | "0400" => Some(self.process_financial(request).await),
			"0220" | "0420" => {
				self.record_advice(request).await;
				None
			}
			"0800" => Some(self.process_network_management(request).await),
			_ => {
				warn!(mti = %request.mti, "unsupported MTI");
				Some(build_response(request, "0210", "12"))
			}
		}
	}

	async fn record_advice(&self, request: &Message) {
		if let Some(terminal_id) = request.field(41) {
			if let Some(mut terminal) = self.store.find_terminal(terminal_id).await {
				terminal.last_activity = Some(SystemTime::now());
				let _ = self.store.save_terminal(terminal).await;
			}
		}
	}

	async fn process_financial(&self, request: &Message) -> Message {
		let reply = reply_mti(&request.mti).unwrap_or("0210");

		if self.config.enable_card_validation {
			if let Some(pan) = request.field(2) {
				let result = validator::validate(pan);
				if !result.valid && self.config.reject_invalid_card {
					return build_response(request, reply, "14");
				}
			}
		}

		let stan = request.field(11).unwrap_or_default();
		let local_date = request.field(13).unwrap_or_default();
		if self.duplicates.check_and_record(stan, local_date) {
			return build_response(request, reply, "94");
		}

		let mut forward_request = request.clone();
		if self.config.enable_pin_transposition {
			if let Some(pin_block) = request.field(52) {
				let pan = request.field(2).unwrap_or_default();
				let terminal_id = request.field(41).unwrap_or_default();
				match self.transpose_to_gateway(terminal_id, pin_block, pan).await {
					Ok(transposed) => forward_request.set_field(52, transposed),
					Err(e) => {
						warn!(error = %e, "PIN transposition failed");
						return build_response(request, reply, "96");
					}
				}
			}
		}

		let processing_code = request.field(3).unwrap_or_default();
		let amount: u64 = request.field(4).and_then(|v| v.parse().ok()).unwrap_or(0);
		let local_code = apply_business_caps(processing_code, amount);
		if local_code != "00" {
			return build_response(request, reply, local_code);
		}

		match self.bank.submit(&forward_request).await {
			Ok(bank_response) => {
				let code = bank_response.field(39).unwrap_or("96").to_owned();
				build_response(request, reply, &code)
			}
			Err(e) => {
				info!(error = %e, "bank forwarding failed");
				build_response(request, reply, &e.response_code())
			}
		}
	}

	async fn transpose_to_gateway(
		&self,
		terminal_id: &str,
		pin_block: &str,
		pan: &str,
	) -> Result<String, GatewayError> {
		let terminal = self.store.find_terminal(terminal_id).await;
		// A terminal that has never been through the key-change protocol (or
		// is unknown entirely) is assumed to still be carrying the gateway's
		// out-of-box default terminal key (spec §6: `security.default_terminal_key`).
		let source_key = match terminal.and_then(|t| t.key_ref) {
			Some(key_ref) => {
				let key = self
					.store
					.find_key(&key_ref)
					.await
					.ok_or(RepositoryError::TerminalNotFound(key_ref))?;
				key.value
			}
			None => self.config.default_terminal_key.clone(),
		};
		let transposed = transposition::transpose(&source_key, &self.config.gateway_zonal_key, pin_block, pan)?;
		Ok(transposed)
	}

	async fn process_network_management(&self, request: &Message) -> Message {
		let reply = "0810";
		let processing_code = request.field(3).unwrap_or_default();
		let terminal_id = request.field(41).unwrap_or_default();

		match processing_code {
			"990000" => {
				self.touch_or_create_terminal(terminal_id).await;
				build_response(request, reply, "00")
			}
			"990001" => {
				if let Some(mut terminal) = self.store.find_terminal(terminal_id).await {
					terminal.status = TerminalStatus::Inactive;
					let _ = self.store.save_terminal(terminal).await;
				}
				build_response(request, reply, "00")
			}
			"990002" => build_response(request, reply, "00"),
			"900000" => self.process_key_change(request, terminal_id).await,
			"900001" => self.process_status_query(request, terminal_id).await,
			_ => build_response(request, reply, "12"),
		}
	}

	async fn touch_or_create_terminal(&self, terminal_id: &str) {
		if terminal_id.is_empty() {
			return;
		}
		match self.store.find_terminal(terminal_id).await {
			Some(mut terminal) => {
				terminal.last_activity = Some(SystemTime::now());
				let _ = self.store.save_terminal(terminal).await;
			}
			None if self.config.auto_create_terminal => {
				let mut terminal = Terminal::new(terminal_id);
				terminal.last_activity = Some(SystemTime::now());
				let _ = self.store.save_terminal(terminal).await;
			}
			None => {}
		}
	}

	async fn process_key_change(&self, request: &Message, terminal_id: &str) -> Message {
		let reply = "0810";
		if let Some(merchant_id) = request.field(42) {
			if let Some(mut terminal) = self.store.find_terminal(terminal_id).await {
				if terminal.merchant_id.as_deref() != Some(merchant_id) {
					terminal.merchant_id = Some(merchant_id.to_owned());
					let _ = self.store.save_terminal(terminal).await;
				}
			}
		}
		let key_change_config = keychange::KeyChangeConfig {
			enabled: self.config.enable_key_change,
			auto_create: self.config.auto_create_terminal,
			key_length: self.config.key_length,
			key_expiry_days: self.config.key_expiry_days,
		};
		match keychange::change_key(&self.store, terminal_id, key_change_config).await {
			Ok(result) => {
				let mut response = build_response(request, reply, "00");
				response.set_field(53, format!("KEY_ID:{}", result.key_id));
				response
			}
			Err(e) => {
				warn!(error = %e, "key change failed");
				build_response(request, reply, "96")
			}
		}
	}

	async fn process_status_query(&self, request: &Message, terminal_id: &str) -> Message {
		let reply = "0810";
		match self.store.find_terminal(terminal_id).await {
			Some(terminal) => {
				let key_count = u8::from(terminal.key_ref.is_some());
				let mut response = build_response(request, reply, "00");
				response.set_field(
					53,
					format!(
						"STATUS:{:?},KEYS:{key_count},CHANGES:{}",
						terminal.status, terminal.key_change_count
					),
				);
				response
			}
			None => build_response(request, reply, "14"),
		}
	}
}

// Unit Tests
#[cfg(test)]
mod tests {
	use async_trait::async_trait;

	use super::*;
	use crate::store::memory::InMemoryStore;

	struct AlwaysApproveBank;
	#[async_trait]
	impl BankForwarder for AlwaysApproveBank {
		async fn submit(&self, request: &Message) -> Result<Message, GatewayError> {
			let mut response = request.clone();
			response.set_field(39, "00");
			Ok(response)
		}
	}

	struct AlwaysTimeoutBank;
	#[async_trait]
	impl BankForwarder for AlwaysTimeoutBank {
		async fn submit(&self, _request: &Message) -> Result<Message, GatewayError> {
			Err(GatewayError::BankTimeout)
		}
	}

	fn router_with(bank: Arc<dyn BankForwarder>) -> TransactionRouter {
		TransactionRouter::new(
			Arc::new(InMemoryStore::new()),
			bank,
			RouterConfig {
				gateway_zonal_key: "0123456789ABCDEFFEDCBA9876543210".to_owned(),
				default_terminal_key: "FEDCBA98765432100123456789ABCDEF".to_owned(),
				enable_pin_transposition: true,
				enable_card_validation: true,
				reject_invalid_card: true,
				auto_create_terminal: true,
				enable_key_change: true,
				key_length: 2,
				key_expiry_days: 365,
			},
		)
	}

	#[tokio::test]
	async fn scenario_a_visa_purchase_is_approved() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0200")
			.with_field(2, "4532015112830366")
			.with_field(3, "000000")
			.with_field(4, "000000005000")
			.with_field(11, "000123")
			.with_field(41, "TERM0001");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.mti, "0210");
		assert_eq!(response.field(39), Some("00"));
		assert_eq!(response.field(38).map(str::len), Some(6));
		assert_eq!(response.field(37).map(str::len), Some(12));
		assert_eq!(response.field(2), Some("4532015112830366"));
	}

	#[tokio::test]
	async fn scenario_b_luhn_failure_is_declined_without_forwarding() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0200")
			.with_field(2, "4532015112830367")
			.with_field(4, "000000001000");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.field(39), Some("14"));
	}

	#[tokio::test]
	async fn scenario_c_amount_cap_is_declined() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0200")
			.with_field(3, "000000")
			.with_field(4, "000000200000");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.field(39), Some("61"));
	}

	#[tokio::test]
	async fn scenario_f_bank_timeout_yields_91() {
		let router = router_with(Arc::new(AlwaysTimeoutBank));
		let request = Message::new("0200")
			.with_field(3, "000000")
			.with_field(4, "000000001000");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.field(39), Some("91"));
	}

	#[tokio::test]
	async fn duplicate_resend_is_rejected() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0200")
			.with_field(3, "000000")
			.with_field(4, "000000001000")
			.with_field(11, "000999")
			.with_field(13, "0714");
		let first = router.process(&request).await.unwrap();
		assert_eq!(first.field(39), Some("00"));
		let second = router.process(&request).await.unwrap();
		assert_eq!(second.field(39), Some("94"));
	}

	#[tokio::test]
	async fn unsupported_mti_replies_with_12() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0999");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.mti, "0210");
		assert_eq!(response.field(39), Some("12"));
	}

	#[tokio::test]
	async fn scenario_d_key_change_creates_terminal_and_key() {
		let router = router_with(Arc::new(AlwaysApproveBank));
		let request = Message::new("0800")
			.with_field(3, "900000")
			.with_field(41, "NEWTID01")
			.with_field(42, "MERCH01");
		let response = router.process(&request).await.unwrap();
		assert_eq!(response.mti, "0810");
		assert_eq!(response.field(39), Some("00"));
		assert!(response.field(53).unwrap().starts_with("KEY_ID:"));
	}
}

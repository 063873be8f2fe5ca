//! The literal scenarios A-G, driven against the router/dispatcher/store
//! directly rather than real TCP sockets (see DESIGN.md).

use std::sync::Arc;

use async_trait::async_trait;
use cardgate::{
	crypto::{pinblock, tdes, transposition},
	dispatcher::BankForwarder,
	error::GatewayError,
	iso8583::Message,
	router::{RouterConfig, TransactionRouter},
	store::{memory::InMemoryStore, KeyStatus, TerminalKeyStore},
};

const GATEWAY_ZONAL_KEY: &str = "0123456789ABCDEFFEDCBA9876543210";
const DEFAULT_TERMINAL_KEY: &str = "FEDCBA98765432100123456789ABCDEF";

struct AlwaysApproveBank;
#[async_trait]
impl BankForwarder for AlwaysApproveBank {
	async fn submit(&self, request: &Message) -> Result<Message, GatewayError> {
		let mut response = request.clone();
		response.set_field(39, "00");
		Ok(response)
	}
}

struct NeverRespondsBank;
#[async_trait]
impl BankForwarder for NeverRespondsBank {
	async fn submit(&self, _request: &Message) -> Result<Message, GatewayError> {
		Err(GatewayError::BankTimeout)
	}
}

fn default_config() -> RouterConfig {
	RouterConfig {
		gateway_zonal_key: GATEWAY_ZONAL_KEY.to_owned(),
		default_terminal_key: DEFAULT_TERMINAL_KEY.to_owned(),
		enable_pin_transposition: true,
		enable_card_validation: true,
		reject_invalid_card: true,
		auto_create_terminal: true,
		enable_key_change: true,
		key_length: 2,
		key_expiry_days: 365,
	}
}

fn router_with(bank: Arc<dyn BankForwarder>, store: Arc<dyn TerminalKeyStore>) -> TransactionRouter {
	TransactionRouter::new(store, bank, default_config())
}

#[tokio::test]
async fn scenario_a_visa_purchase_approved_no_bank_forward_needed() {
	let router = router_with(Arc::new(AlwaysApproveBank), Arc::new(InMemoryStore::new()));
	let request = Message::new("0200")
		.with_field(2, "4532015112830366")
		.with_field(3, "000000")
		.with_field(4, "000000005000")
		.with_field(11, "000123")
		.with_field(41, "TERM0001");

	let response = router.process(&request).await.expect("financial MTI always replies");

	assert_eq!(response.mti, "0210");
	assert_eq!(response.field(39), Some("00"));
	assert_eq!(response.field(38).map(str::len), Some(6));
	assert_eq!(response.field(37).map(str::len), Some(12));
	assert_eq!(response.field(2), Some("4532015112830366"));
	assert_eq!(response.field(3), Some("000000"));
	assert_eq!(response.field(4), Some("000000005000"));
	assert_eq!(response.field(11), Some("000123"));
}

#[tokio::test]
async fn scenario_b_luhn_failure_is_declined() {
	let router = router_with(Arc::new(AlwaysApproveBank), Arc::new(InMemoryStore::new()));
	let request = Message::new("0200")
		.with_field(2, "4532015112830367")
		.with_field(4, "000000001000");

	let response = router.process(&request).await.unwrap();

	assert_eq!(response.mti, "0210");
	assert_eq!(response.field(39), Some("14"));
}

#[tokio::test]
async fn scenario_c_amount_over_cap_is_declined() {
	let router = router_with(Arc::new(AlwaysApproveBank), Arc::new(InMemoryStore::new()));
	let request = Message::new("0200")
		.with_field(3, "000000")
		.with_field(4, "000000200000");

	let response = router.process(&request).await.unwrap();

	assert_eq!(response.mti, "0210");
	assert_eq!(response.field(39), Some("61"));
}

#[tokio::test]
async fn scenario_d_key_change_creates_terminal_and_key() {
	let store = Arc::new(InMemoryStore::new());
	let router = router_with(Arc::new(AlwaysApproveBank), store.clone());

	let request = Message::new("0800")
		.with_field(3, "900000")
		.with_field(41, "NEWTID01")
		.with_field(42, "MERCH01");
	let response = router.process(&request).await.unwrap();

	assert_eq!(response.mti, "0810");
	assert_eq!(response.field(39), Some("00"));
	let field53 = response.field(53).unwrap();
	assert!(field53.starts_with("KEY_ID:"));

	let terminal = store.find_terminal("NEWTID01").await.expect("auto-created");
	assert_eq!(terminal.key_change_count, 1);
	let key_id = field53.trim_start_matches("KEY_ID:");
	let key = store.find_key(key_id).await.expect("key was saved");
	assert_eq!(key.status, KeyStatus::Active);
	assert_eq!(key.value.len(), 32);
	assert_eq!(key.kcv, tdes::kcv(&key.value).unwrap());
}

#[tokio::test]
async fn scenario_e_key_rotation_deactivates_prior_key() {
	let store = Arc::new(InMemoryStore::new());
	let router = router_with(Arc::new(AlwaysApproveBank), store.clone());

	let request = Message::new("0800")
		.with_field(3, "900000")
		.with_field(41, "NEWTID01")
		.with_field(42, "MERCH01");

	let first = router.process(&request).await.unwrap();
	let first_key_id = first.field(53).unwrap().trim_start_matches("KEY_ID:").to_owned();
	let first_key_value = store.find_key(&first_key_id).await.unwrap().value;

	let second = router.process(&request).await.unwrap();
	assert_eq!(second.field(39), Some("00"));
	let second_key_id = second.field(53).unwrap().trim_start_matches("KEY_ID:").to_owned();
	assert_ne!(first_key_id, second_key_id);

	let prior_key = store.find_key(&first_key_id).await.unwrap();
	assert_eq!(prior_key.status, KeyStatus::Inactive);

	let new_key = store.find_key(&second_key_id).await.unwrap();
	assert_ne!(new_key.value, first_key_value);

	let terminal = store.find_terminal("NEWTID01").await.unwrap();
	assert_eq!(terminal.key_change_count, 2);
}

#[tokio::test]
async fn scenario_f_bank_timeout_yields_91() {
	let router = router_with(Arc::new(NeverRespondsBank), Arc::new(InMemoryStore::new()));
	let request = Message::new("0200")
		.with_field(3, "000000")
		.with_field(4, "000000001000")
		.with_field(11, "000321");

	let response = router.process(&request).await.unwrap();

	assert_eq!(response.mti, "0210");
	assert_eq!(response.field(39), Some("91"));
}

#[test]
fn scenario_g_pin_transposition_round_trip_through_gateway_and_bank() {
	let terminal_key = "0123456789ABCDEFFEDCBA9876543210";
	let gateway_key = "1111111111111111AAAAAAAAAAAAAAAA";
	let bank_key = "2222222222222222BBBBBBBBBBBBBBBB";
	let pan = "4532015112830366";
	let clear_pin = "1234";

	let clear_block = pinblock::format0_encode(clear_pin, pan).unwrap();
	let e_terminal = tdes::tdes_encrypt(&clear_block, terminal_key, false).unwrap();

	let e_gateway = transposition::transpose(terminal_key, gateway_key, &e_terminal, pan).unwrap();
	let e_bank = transposition::transpose(gateway_key, bank_key, &e_gateway, pan).unwrap();

	let decrypted = tdes::tdes_decrypt(&e_bank, bank_key, false).unwrap();
	let recovered_pin = pinblock::format0_decode(&decrypted, pan).unwrap();

	assert_eq!(recovered_pin, clear_pin);
}

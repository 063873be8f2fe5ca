//! The bank dispatcher (C9): translates POS messages to the bank dialect,
//! transposes the PIN block to the bank key, and forwards them over the
//! single persistent bank connection with retry and timeout handling.

// Uses
use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, info_span, warn, Instrument};

use crate::{
	crypto::transposition,
	error::GatewayError,
	iso8583::{self, dictionary, Message},
	masking,
	net::bank_channel::BankChannel,
	util::now_ms,
};

/// Fields copied verbatim from the POS request into the Bank request,
/// before F7/F37 are re-stamped.
const COPIED_FIELDS: &[u8] = &[2, 3, 4, 7, 11, 12, 13, 14, 22, 25, 35, 41, 42, 43, 49];

#[derive(Clone, Debug)]
pub struct RetryConfig {
	pub max_attempts: u16,
	pub delay: Duration,
	pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			delay: Duration::from_millis(5000),
			backoff_multiplier: 2.0,
		}
	}
}

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
	pub timeout: Duration,
	pub retry: RetryConfig,
	pub gateway_zonal_key: String,
	pub bank_key: String,
}

struct PendingRequest {
	respond_to: oneshot::Sender<Result<Message, GatewayError>>,
	deadline: Instant,
}

struct Submission {
	request: Message,
	respond_to: oneshot::Sender<Result<Message, GatewayError>>,
}

/// What the router depends on to hand a transaction to the bank.
/// Kept as a trait so routing logic can be unit-tested against a stub.
#[async_trait]
pub trait BankForwarder: Send + Sync {
	async fn submit(&self, request: &Message) -> Result<Message, GatewayError>;
}

/// The handle the rest of the process holds: cheap to clone, backed by the
/// submission channel into the single dispatcher task.
#[derive(Clone)]
pub struct BankDispatcher {
	sender: mpsc::Sender<Submission>,
}

impl BankDispatcher {
	/// Spawns the dispatcher's send/receive task over `channel` and returns
	/// a handle to it. `channel` is boxed so the caller can supply either a
	/// real [`crate::net::bank_channel::TcpBankChannel`] or a test stub.
	pub fn spawn(channel: Box<dyn BankChannel>, config: DispatcherConfig) -> Self {
		let (sender, receiver) = mpsc::channel(128);
		tokio::spawn(run(channel, config, receiver).instrument(info_span!("bank_dispatcher")));
		Self { sender }
	}
}

#[async_trait]
impl BankForwarder for BankDispatcher {
	async fn submit(&self, request: &Message) -> Result<Message, GatewayError> {
		let (respond_to, receiver) = oneshot::channel();
		let submission = Submission {
			request: request.clone(),
			respond_to,
		};
		self.sender
			.send(submission)
			.await
			.map_err(|_| GatewayError::BankTimeout)?;
		receiver.await.map_err(|_| GatewayError::BankTimeout)?
	}
}

/// Builds the Bank-dialect request from a POS request: copies
/// [`COPIED_FIELDS`], re-stamps F7 to the current time, mints a fresh F37,
/// and transposes F52 from the gateway zonal key to the bank key.
fn translate(pos_request: &Message, config: &DispatcherConfig) -> Result<Message, GatewayError> {
	let mut bank_request = Message::new(pos_request.mti.clone());
	for &number in COPIED_FIELDS {
		if let Some(value) = pos_request.field(number) {
			bank_request.set_field(number, value.to_owned());
		}
	}
	bank_request.set_field(7, format!("{:010}", now_ms() % 10_000_000_000));
	bank_request.set_field(37, crate::router::mint_rrn());

	if let Some(pin_block) = pos_request.field(52) {
		let pan = pos_request.field(2).unwrap_or_default();
		let transposed = transposition::transpose(&config.gateway_zonal_key, &config.bank_key, pin_block, pan)
			.map_err(GatewayError::from)?;
		bank_request.set_field(52, transposed);
	}

	Ok(bank_request)
}

/// The single task owning the bank connection: a cooperative loop that
/// accepts submissions, sends them (retrying connection failures with
/// exponential backoff), and matches incoming bank responses to pending
/// requests by `(F11, F13)`. Unmatched responses are logged and dropped;
/// expired pending requests resolve to [`GatewayError::BankTimeout`].
async fn run(
	mut channel: Box<dyn BankChannel>,
	config: DispatcherConfig,
	mut receiver: mpsc::Receiver<Submission>,
) {
	let pending: Mutex<HashMap<(String, String), PendingRequest>> = Mutex::new(HashMap::new());
	let mut sweep = tokio::time::interval(Duration::from_secs(1));

	loop {
		tokio::select! {
			submission = receiver.recv() => {
				let Some(submission) = submission else {
					info!("submission channel closed, bank dispatcher exiting");
					break;
				};
				handle_submission(submission, &mut channel, &config, &pending).await;
			}
			received = channel.receive() => {
				let was_err = received.is_err();
				handle_inbound(received, &pending).await;
				if was_err {
					tokio::time::sleep(Duration::from_millis(500)).await;
				}
			}
			_ = sweep.tick() => {
				sweep_expired(&pending).await;
			}
		}
	}
}

async fn handle_submission(
	submission: Submission,
	channel: &mut Box<dyn BankChannel>,
	config: &DispatcherConfig,
	pending: &Mutex<HashMap<(String, String), PendingRequest>>,
) {
	let bank_request = match translate(&submission.request, config) {
		Ok(msg) => msg,
		Err(e) => {
			let _ = submission.respond_to.send(Err(e));
			return;
		}
	};

	let stan = bank_request.field(11).unwrap_or_default().to_owned();
	let local_date = bank_request.field(13).unwrap_or_default().to_owned();

	info!(message = %masking::masked_summary(&bank_request), "forwarding request to bank");

	let wire = match iso8583::pack(dictionary::bank(), &bank_request) {
		Ok(bytes) => bytes,
		Err(e) => {
			let _ = submission.respond_to.send(Err(GatewayError::FieldDecode(e)));
			return;
		}
	};

	let mut delay = config.retry.delay;
	let mut last_err = None;
	for attempt in 1..=config.retry.max_attempts {
		match channel.send(&wire).await {
			Ok(()) => {
				last_err = None;
				break;
			}
			Err(e) => {
				warn!(attempt, error = %e, "bank send failed, will retry");
				last_err = Some(e);
				if attempt < config.retry.max_attempts {
					tokio::time::sleep(delay).await;
					delay = delay.mul_f32(config.retry.backoff_multiplier);
				}
			}
		}
	}

	if last_err.is_some() {
		let _ = submission.respond_to.send(Err(GatewayError::BankTimeout));
		return;
	}

	let deadline = Instant::now() + config.timeout;
	pending.lock().await.insert(
		(stan, local_date),
		PendingRequest {
			respond_to: submission.respond_to,
			deadline,
		},
	);
}

async fn handle_inbound(
	received: Result<Vec<u8>, crate::error::FramingError>,
	pending: &Mutex<HashMap<(String, String), PendingRequest>>,
) {
	let bytes = match received {
		Ok(bytes) => bytes,
		Err(e) => {
			warn!(error = %e, "error reading from bank connection");
			return;
		}
	};
	let response = match iso8583::unpack(dictionary::bank(), &bytes) {
		Ok(msg) => msg,
		Err(e) => {
			warn!(error = %e, "undecodable bank response, dropping");
			return;
		}
	};
	info!(message = %masking::masked_summary(&response), "received bank response");
	let stan = response.field(11).unwrap_or_default().to_owned();
	let local_date = response.field(13).unwrap_or_default().to_owned();

	let mut pending = pending.lock().await;
	match pending.remove(&(stan.clone(), local_date.clone())) {
		Some(entry) => {
			let _ = entry.respond_to.send(Ok(response));
		}
		None => warn!(stan, local_date, "unmatched bank response, dropping"),
	}
}

async fn sweep_expired(pending: &Mutex<HashMap<(String, String), PendingRequest>>) {
	let now = Instant::now();
	let mut pending = pending.lock().await;
	let expired: Vec<_> = pending
		.iter()
		.filter(|(_, entry)| entry.deadline <= now)
		.map(|(key, _)| key.clone())
		.collect();
	for key in expired {
		if let Some(entry) = pending.remove(&key) {
			let _ = entry.respond_to.send(Err(GatewayError::BankTimeout));
		}
	}
}

// Unit Tests
#[cfg(test)]
mod tests {
	use super::*;

	fn sample_config() -> DispatcherConfig {
		DispatcherConfig {
			timeout: Duration::from_millis(50),
			retry: RetryConfig::default(),
			gateway_zonal_key: "0123456789ABCDEFFEDCBA9876543210".trim_end_matches('0').to_owned() + "0",
			bank_key: "FEDCBA98765432100123456789ABCDEF".to_owned(),
		}
	}

	#[test]
	fn translate_copies_listed_fields_and_mints_f37() {
		let config = sample_config();
		let request = Message::new("0200")
			.with_field(2, "4532015112830366")
			.with_field(3, "000000")
			.with_field(4, "000000005000")
			.with_field(11, "000123")
			.with_field(13, "0714")
			.with_field(41, "TERM0001");
		let translated = translate(&request, &config).unwrap();
		assert_eq!(translated.field(2), Some("4532015112830366"));
		assert_eq!(translated.field(11), Some("000123"));
		assert!(translated.field(37).is_some());
		assert_eq!(translated.field(37).unwrap().len(), 12);
	}

	#[test]
	fn translate_transposes_pin_block_when_present() {
		let config = DispatcherConfig {
			timeout: Duration::from_millis(50),
			retry: RetryConfig::default(),
			gateway_zonal_key: "0123456789ABCDEFFEDCBA9876543210".to_owned(),
			bank_key: "FEDCBA98765432100123456789ABCDEF".to_owned(),
		};
		let pan = "4532015112830366";
		let clear = crate::crypto::pinblock::format0_encode("1234", pan).unwrap();
		let under_gateway_key = crate::crypto::tdes::tdes_encrypt(&clear, &config.gateway_zonal_key, false).unwrap();
		let request = Message::new("0200").with_field(2, pan).with_field(52, under_gateway_key);
		let translated = translate(&request, &config).unwrap();
		let under_bank_key = translated.field(52).unwrap();
		let decoded_clear = crate::crypto::tdes::tdes_decrypt(under_bank_key, &config.bank_key, false).unwrap();
		let pin = crate::crypto::pinblock::format0_decode(&decoded_clear, pan).unwrap();
		assert_eq!(pin, "1234");
	}
}

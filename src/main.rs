//! The `cardgate` binary: loads configuration, wires the store/dispatcher/
//! router together, and either serves the POS listener or runs one of the
//! operational utility subcommands (spec §2, §7).

// Linting Rules
#![warn(
	clippy::complexity,
	clippy::correctness,
	clippy::pedantic,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::clone_on_ref_ptr,
	clippy::dbg_macro,
	clippy::exit,
	clippy::str_to_string,
	clippy::undocumented_unsafe_blocks,
	clippy::wildcard_enum_match_arm
)]
#![allow(
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::similar_names,
	clippy::struct_excessive_bools,
	clippy::too_many_lines,
	clippy::unnecessary_wraps
)]

// Modules
mod cli;

// Uses
use std::{process::ExitCode, sync::Arc};

use cardgate::{
	card::validator,
	config::Config,
	crypto::tdes,
	dispatcher::{BankDispatcher, DispatcherConfig, RetryConfig},
	net::{bank_channel::TcpBankChannel, pos_listener},
	router::{RouterConfig, TransactionRouter},
	store::memory::InMemoryStore,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

use crate::cli::build_cli;

fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();
}

fn load_config(config_path: Option<&str>) -> Result<Config, figment::Error> {
	let figment = match config_path {
		Some(path) => Config::figment().merge(figment::providers::Toml::file(path).nested()),
		None => Config::figment(),
	};
	Config::try_from(figment)
}

async fn run_serve(config: Config) -> Result<(), cardgate::error::GatewayError> {
	info!(port = config.pos.port, "starting cardgate");

	let store = Arc::new(InMemoryStore::new());

	let bank_channel = Box::new(TcpBankChannel::new(config.bank.host.clone(), config.bank.port));
	let dispatcher_config = DispatcherConfig {
		timeout: std::time::Duration::from_millis(u64::from(config.bank.timeout_ms)),
		retry: RetryConfig {
			max_attempts: config.bank.retry.max_attempts,
			delay: std::time::Duration::from_millis(u64::from(config.bank.retry.delay_ms)),
			backoff_multiplier: config.bank.retry.backoff_multiplier,
		},
		gateway_zonal_key: config.security.gateway_zonal_key.clone(),
		bank_key: config.security.bank_key.clone(),
	};
	let dispatcher = Arc::new(BankDispatcher::spawn(bank_channel, dispatcher_config));

	let router_config = RouterConfig {
		gateway_zonal_key: config.security.gateway_zonal_key.clone(),
		default_terminal_key: config.security.default_terminal_key.clone(),
		enable_pin_transposition: config.security.pin.enable_transposition,
		enable_card_validation: config.security.card.enable_validation,
		reject_invalid_card: config.security.card.reject_invalid,
		auto_create_terminal: config.terminal.auto_create,
		enable_key_change: config.terminal.enable_key_change,
		key_length: config.terminal.key_length,
		key_expiry_days: config.terminal.key_expiry_days,
	};
	let router = Arc::new(TransactionRouter::new(store, dispatcher, router_config));

	let listener = TcpListener::bind(("0.0.0.0", config.pos.port))
		.await
		.map_err(|e| cardgate::error::GatewayError::Framing(cardgate::error::FramingError::Io(e.to_string())))?;

	let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("received interrupt, signalling shutdown");
			let _ = shutdown_tx.send(());
		}
	});

	pos_listener::serve(listener, router, shutdown_rx).await;
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = build_cli().get_matches();
	let config_path = matches.value_of("config");

	let config = match load_config(config_path) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("failed to load configuration: {e}");
			return ExitCode::FAILURE;
		}
	};

	init_tracing();

	match matches.subcommand() {
		Some(("kcv", sub)) => {
			let key = sub.value_of("key").expect("required arg");
			match tdes::kcv(key) {
				Ok(kcv) => {
					println!("{kcv}");
					ExitCode::SUCCESS
				}
				Err(e) => {
					eprintln!("error computing KCV: {e}");
					ExitCode::FAILURE
				}
			}
		}
		Some(("validate-pan", sub)) => {
			let pan = sub.value_of("pan").expect("required arg");
			let result = validator::validate(pan);
			println!(
				"masked={} brand={} luhn_ok={} valid={}",
				result.masked, result.brand, result.luhn_ok, result.valid
			);
			if let Some(reason) = &result.error {
				println!("reason={reason}");
			}
			if result.valid {
				ExitCode::SUCCESS
			} else {
				ExitCode::FAILURE
			}
		}
		Some(("serve", _)) | None => match run_serve(config).await {
			Ok(()) => ExitCode::SUCCESS,
			Err(e) => {
				error!(error = %e, "cardgate exited with an error");
				ExitCode::FAILURE
			}
		},
		_ => unreachable!("clap guarantees only the declared subcommands"),
	}
}

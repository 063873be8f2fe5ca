//! The gateway's configuration: a `figment` layering of defaults, a TOML
//! file, and environment overrides. Captured once at startup and passed
//! down explicitly — no process-wide mutable singletons.

// Uses
use figment::{
	providers::{Env, Format, Serialized, Toml},
	value::{Dict, Map},
	Error as FigmentError,
	Figment,
	Metadata,
	Profile,
	Provider,
};
use serde_derive::{Deserialize, Serialize};

// Constants
const FILE_NAME: &str = "cardgate.toml";
/// Concatenated with the variable names below.
const ENV_PREFIX: &str = "CARDGATE_";
const ENV_FILE_NAME_OVERRIDE: &str = "CONFIG";
const ENV_PROFILE: &str = "PROFILE";

#[derive(Clone, Deserialize, Serialize)]
pub struct PosConfig {
	pub port: u16,
}

impl Default for PosConfig {
	fn default() -> Self {
		Self { port: 8000 }
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct RetryConfig {
	pub max_attempts: u16,
	pub delay_ms: u32,
	pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			delay_ms: 5000,
			backoff_multiplier: 2.0,
		}
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct BankConfig {
	pub host: String,
	pub port: u16,
	pub timeout_ms: u32,
	pub max_connections: u16,
	pub retry: RetryConfig,
}

impl Default for BankConfig {
	fn default() -> Self {
		Self {
			host: "192.168.1.100".to_owned(),
			port: 8001,
			timeout_ms: 30_000,
			max_connections: 5,
			retry: RetryConfig::default(),
		}
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct PinConfig {
	pub enable_transposition: bool,
}

impl Default for PinConfig {
	fn default() -> Self {
		Self {
			enable_transposition: true,
		}
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct CardConfig {
	pub enable_validation: bool,
	pub reject_invalid: bool,
}

impl Default for CardConfig {
	fn default() -> Self {
		Self {
			enable_validation: true,
			reject_invalid: true,
		}
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
	pub gateway_zonal_key: String,
	pub default_terminal_key: String,
	/// The bank host's own TDES key, used by the dispatcher (C9) to
	/// transpose F52 from the gateway zonal key on the final hop before
	/// forwarding (spec §4.9). Not named in spec §6's enumerated option
	/// list, but required for the transposition chain it describes; see
	/// DESIGN.md.
	pub bank_key: String,
	pub pin: PinConfig,
	pub card: CardConfig,
}

impl Default for SecurityConfig {
	fn default() -> Self {
		Self {
			gateway_zonal_key: "0123456789ABCDEFFEDCBA9876543210".to_owned(),
			default_terminal_key: "FEDCBA98765432100123456789ABCDEF".to_owned(),
			bank_key: "AABBCCDDEEFF00112233445566778899".to_owned(),
			pin: PinConfig::default(),
			card: CardConfig::default(),
		}
	}
}

#[derive(Clone, Deserialize, Serialize)]
pub struct TerminalConfig {
	pub auto_create: bool,
	pub enable_key_change: bool,
	pub key_length: u8,
	pub key_expiry_days: u32,
}

impl Default for TerminalConfig {
	fn default() -> Self {
		Self {
			auto_create: true,
			enable_key_change: true,
			key_length: 2,
			key_expiry_days: 365,
		}
	}
}

/// The gateway configuration.
#[non_exhaustive]
#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(skip)]
	pub profile: Profile,
	pub pos: PosConfig,
	pub bank: BankConfig,
	pub security: SecurityConfig,
	pub terminal: TerminalConfig,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			profile: Self::DEFAULT_PROFILE,
			pos: PosConfig::default(),
			bank: BankConfig::default(),
			security: SecurityConfig::default(),
			terminal: TerminalConfig::default(),
		}
	}
}

impl Config {
	pub const DEFAULT_PROFILE: Profile = Profile::const_new("default");
	pub const PROFILE: &'static str = "profile";

	/// Allows the configuration to be extracted from any [`Provider`].
	///
	/// The reason this isn't a [`TryFrom`] implementation is because it
	/// conflicts with a default implementation provided by Rust.
	pub fn try_from<P>(provider: P) -> Result<Config, FigmentError>
	where
		P: Provider,
	{
		Figment::from(provider).extract()
	}

	/// Provides a default provider: defaults, overlaid by the TOML file (if
	/// present), overlaid by `CARDGATE_`-prefixed environment variables.
	pub fn figment() -> Figment {
		Figment::from(Serialized::defaults(Config::default()))
			.merge(
				Toml::file(Env::var_or(
					format!("{ENV_PREFIX}{ENV_FILE_NAME_OVERRIDE}").as_str(),
					FILE_NAME,
				))
				.nested(),
			)
			.merge(
				Env::prefixed(ENV_PREFIX)
					.ignore(&[ENV_FILE_NAME_OVERRIDE, ENV_PROFILE])
					.split("_")
					.global(),
			)
			.select(Profile::from_env_or(
				format!("{ENV_PREFIX}{ENV_PROFILE}").as_str(),
				Self::DEFAULT_PROFILE,
			))
	}
}

impl Provider for Config {
	fn metadata(&self) -> Metadata {
		Metadata::named("Gateway Config")
	}

	fn data(&self) -> Result<Map<Profile, Dict>, FigmentError> {
		Serialized::defaults(self).data()
	}

	fn profile(&self) -> Option<Profile> {
		Some(self.profile.clone())
	}
}

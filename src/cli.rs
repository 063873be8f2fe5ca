// Provides the CLI for the program.

// Uses
use clap::{Arg, Command};

// Constants
pub const APPLICATION_PROPER_NAME: &str = "Cardgate";
pub const APPLICATION_BIN_NAME: &str = env!("CARGO_PKG_NAME");

/// Builds the command-line interface. The default (no subcommand) behaviour
/// is `serve`; `kcv` and `validate-pan` expose the crypto core and card
/// validator directly for operational debugging, without making them part
/// of the wire protocol.
pub fn build_cli() -> Command<'static> {
	Command::new(APPLICATION_PROPER_NAME)
		.version(env!("CARGO_PKG_VERSION"))
		.author(env!("CARGO_PKG_AUTHORS"))
		.about(env!("CARGO_PKG_DESCRIPTION"))
		.arg(
			Arg::new("config")
				.long("config")
				.takes_value(true)
				.value_name("PATH")
				.help("Path to a cardgate.toml configuration file (defaults per CARDGATE_CONFIG/./cardgate.toml)"),
		)
		.subcommand(Command::new("serve").about("Starts the POS listener and the bank dispatcher (default)"))
		.next_help_heading("OPERATIONAL UTILITIES")
		.subcommand(
			Command::new("kcv")
				.about("Computes the Key Check Value (C1) for a TDES key")
				.arg(
					Arg::new("key")
						.long("key")
						.takes_value(true)
						.required(true)
						.value_name("HEX")
						.help("A 32- or 48-hex-char TDES key"),
				),
		)
		.subcommand(
			Command::new("validate-pan")
				.about("Runs the card validator (C3) against a PAN")
				.arg(
					Arg::new("pan")
						.long("pan")
						.takes_value(true)
						.required(true)
						.value_name("PAN")
						.help("The primary account number to validate"),
				),
		)
}

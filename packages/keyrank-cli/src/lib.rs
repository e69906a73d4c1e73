//! Shared command-line surface for keyrank binaries.

use std::path::PathBuf;

use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

/// `<crate version>-<git sha>-<target triple>`, stamped at build time.
pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_LOG_LEVEL: &str = "info";

/// Config file flag shared by every keyrank binary. Flatten it into the binary's `Args`.
#[derive(Debug, Clone, clap::Args)]
pub struct ConfigArg {
	/// Path to the keyrank TOML config.
	#[arg(long = "config", short = 'c', value_name = "FILE")]
	pub path: PathBuf,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.literal(AnsiColor::Green.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
		.error(AnsiColor::Red.on_default() | Effects::BOLD)
}

/// Filter for `service.log_level`. An unparsable directive falls back to `info` instead of
/// silencing the binary.
pub fn log_filter(level: &str) -> EnvFilter {
	EnvFilter::try_new(level).unwrap_or_else(|err| {
		eprintln!("Invalid log level {level:?} ({err}). Falling back to {FALLBACK_LOG_LEVEL}.");

		EnvFilter::new(FALLBACK_LOG_LEVEL)
	})
}

/// Installs the process-wide fmt subscriber.
pub fn init_tracing(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	tracing_subscriber::fmt().with_env_filter(log_filter(level)).try_init()
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Debug, Parser)]
	struct Cli {
		#[command(flatten)]
		config: ConfigArg,
	}

	#[test]
	fn config_flag_accepts_short_and_long_forms() {
		let short = Cli::try_parse_from(["keyrank", "-c", "keyrank.toml"]).expect("short flag");
		let long =
			Cli::try_parse_from(["keyrank", "--config", "/etc/keyrank.toml"]).expect("long flag");

		assert_eq!(short.config.path, PathBuf::from("keyrank.toml"));
		assert_eq!(long.config.path, PathBuf::from("/etc/keyrank.toml"));
	}

	#[test]
	fn config_flag_is_required() {
		assert!(Cli::try_parse_from(["keyrank"]).is_err());
	}

	#[test]
	fn target_directives_pass_through() {
		assert_eq!(log_filter("keyrank_service=debug").to_string(), "keyrank_service=debug");
	}
}

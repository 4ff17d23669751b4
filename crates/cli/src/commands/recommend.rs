use std::fs;
use std::io::{self, Read};

use pumpfit_agent::RecommendationEngine;
use pumpfit_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use pumpfit_core::PreferenceProfile;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_INPUT, EXIT_VALIDATION};

const COMMAND: &str = "recommend";

/// `input` is a file path, or `-` for stdin.
pub fn run(input: &str, rules_only: bool) -> CommandResult {
    let raw = match read_input(input) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "input",
                format!("could not read `{input}`: {error}"),
                EXIT_INPUT,
            )
        }
    };
    run_payload(&raw, rules_only)
}

pub fn run_payload(raw: &str, rules_only: bool) -> CommandResult {
    let overrides = ConfigOverrides {
        llm_enabled: rules_only.then_some(false),
        ..ConfigOverrides::default()
    };
    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };
    init_logging(&config);

    let engine = match RecommendationEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "provider_config",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let profile = match PreferenceProfile::from_json_str(raw) {
        Ok(profile) => profile,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "validation",
                error.to_string(),
                EXIT_VALIDATION,
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            )
        }
    };

    let recommendation = runtime.block_on(engine.recommend(profile));
    CommandResult::json(COMMAND, &recommendation)
}

fn read_input(input: &str) -> io::Result<String> {
    if input == "-" {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        return Ok(raw);
    }
    fs::read_to_string(input)
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::filter::LevelFilter;

    let level = config.logging.level.parse::<LevelFilter>().unwrap_or(LevelFilter::WARN);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_writer(io::stderr).with_max_level(level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

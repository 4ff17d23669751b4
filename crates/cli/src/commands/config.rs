use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pumpfit_core::config::{AppConfig, LoadOptions, CONFIG_FILE_NAME, NESTED_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key_path: "llm.enabled",
            env_keys: &["PUMPFIT_LLM_ENABLED"],
            value: config.llm.enabled.to_string(),
        },
        Field {
            key_path: "llm.provider",
            env_keys: &["PUMPFIT_LLM_PROVIDER"],
            value: config.llm.provider.as_str().to_string(),
        },
        Field { key_path: "llm.api_key", env_keys: &["PUMPFIT_LLM_API_KEY"], value: api_key },
        Field {
            key_path: "llm.base_url",
            env_keys: &["PUMPFIT_LLM_BASE_URL"],
            value: config.llm_base_url().to_string(),
        },
        Field {
            key_path: "llm.fast_model",
            env_keys: &["PUMPFIT_LLM_FAST_MODEL"],
            value: config.llm.fast_model.clone(),
        },
        Field {
            key_path: "llm.reasoning_model",
            env_keys: &["PUMPFIT_LLM_REASONING_MODEL"],
            value: config.llm.reasoning_model.clone(),
        },
        Field {
            key_path: "llm.timeout_secs",
            env_keys: &["PUMPFIT_LLM_TIMEOUT_SECS"],
            value: config.llm.timeout_secs.to_string(),
        },
        Field {
            key_path: "llm.max_tokens",
            env_keys: &["PUMPFIT_LLM_MAX_TOKENS"],
            value: config.llm.max_tokens.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["PUMPFIT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["PUMPFIT_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["PUMPFIT_LOGGING_LEVEL", "PUMPFIT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["PUMPFIT_LOGGING_FORMAT", "PUMPFIT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_lowercase(),
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a provider prefix such as `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

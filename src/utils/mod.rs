pub mod retry;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::models::common::Config;

const DEFAULT_CONFIG_FILE: &str = "ethernal.yml";

/// Config file path: first CLI argument, then `ETHERNAL_CONFIG`, then `ethernal.yml`.
pub fn config_path_from_env() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ETHERNAL_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
        .into()
}

pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<Config> {
    // Values from the file win over ETHERNAL_* environment variables. Env
    // values stay strings so numeric-looking credentials survive; flags and
    // numbers are converted when deserialized.
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix("ETHERNAL"))
        .add_source(config::File::from(config_path.as_ref()).required(false))
        .build()
        .context("failed to read config")?;

    let config: Config = settings
        .try_deserialize()
        .context("failed to parse config")?;

    Ok(config)
}

pub fn strip_html(error: &str) -> String {
    // If the error contains HTML tags, extract just the text content
    if error.contains("<!doctype html>") || error.contains("<!DOCTYPE html>") || error.contains("<html>") {
        error
            .lines()
            .map(|line| line.trim())
            .find(|line| {
                !line.starts_with('<')
                    && !line.ends_with('>')
                    && !line.is_empty()
                    && *line != "html"
                    && *line != "body"
            })
            .unwrap_or(error)
            .to_string()
    } else {
        error.to_string()
    }
}

/// Best message carried by an error response body: a JSON `message`, a nested
/// `error.message`, a plain `error` string, then the raw text.
pub fn extract_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
            .or_else(|| value.get("error").and_then(Value::as_str))
            .or_else(|| value.as_str());
        if let Some(message) = message {
            return Some(message.to_string());
        }
    }

    let text = strip_html(body);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn env_credentials_are_read_verbatim() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ethernal.yml");
        fs::write(&path, "workspace: from-file\npoll_interval_ms: 250\n")?;

        // Only this test touches ETHERNAL_* variables
        unsafe {
            std::env::set_var("ETHERNAL_PASSWORD", "00123");
            std::env::set_var("ETHERNAL_API_TOKEN", "1e3");
            std::env::set_var("ETHERNAL_VERBOSE", "true");
            std::env::set_var("ETHERNAL_WORKSPACE", "from-env");
        }
        let config = load_config(&path);
        unsafe {
            for key in ["PASSWORD", "API_TOKEN", "VERBOSE", "WORKSPACE"] {
                std::env::remove_var(format!("ETHERNAL_{key}"));
            }
        }
        let config = config?;

        assert_eq!(config.password.as_deref(), Some("00123"));
        assert_eq!(config.api_token.as_deref(), Some("1e3"));
        assert!(config.verbose);
        assert_eq!(config.workspace.as_deref(), Some("from-file"));
        assert_eq!(config.poll_interval_ms, 250);
        Ok(())
    }

    #[test]
    fn extracts_json_messages_in_order() {
        assert_eq!(
            extract_error_message(r#"{"message":"Invalid block"}"#).as_deref(),
            Some("Invalid block")
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"INVALID_PASSWORD"}}"#).as_deref(),
            Some("INVALID_PASSWORD")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"Forbidden"}"#).as_deref(),
            Some("Forbidden")
        );
    }

    #[test]
    fn falls_back_to_text_and_strips_html() {
        assert_eq!(
            extract_error_message("Workspace not found").as_deref(),
            Some("Workspace not found")
        );
        let html = "<!doctype html>\n<html>\n<body>\nBad Gateway\n</body>\n</html>";
        assert_eq!(extract_error_message(html).as_deref(), Some("Bad Gateway"));
        assert_eq!(extract_error_message("   "), None);
    }
}

use crate::error::CliError;
use engine_config::env::EnvContext;
use std::{collections::HashMap, fs, path::Path};
use tracing::info;

/// Process environment, optionally overlaid with a `KEY=VALUE` file.
pub fn load_env(file: Option<&Path>) -> Result<EnvContext, CliError> {
    let mut env = EnvContext::capture();
    if let Some(path) = file {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::EnvFile(format!("failed to read {}: {e}", path.display()))
        })?;
        let vars = parse_env_content(&content)?;
        info!(path = %path.display(), vars = vars.len(), "Loaded env file");
        env.overlay(vars);
    }
    Ok(env)
}

fn parse_env_content(content: &str) -> Result<HashMap<String, String>, CliError> {
    let mut vars = HashMap::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(CliError::EnvFile(format!(
                "malformed line {} (expected KEY=VALUE)",
                line_num + 1
            )));
        };
        let key = key.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            return Err(CliError::EnvFile(format!(
                "empty key at line {}",
                line_num + 1
            )));
        }
        vars.insert(key.to_string(), unquote_value(value));
    }
    Ok(vars)
}

fn unquote_value(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_settings_file() {
        let content = r#"
# Bitrix portal
CRMSYNC_BITRIX_WEBHOOK="https://acme.bitrix24.ru/rest/1/abc"
export CRMSYNC_IMPORT_CONCURRENCY=8
CRMSYNC_TERMINATE_AS='cancelled'
        "#;

        let vars = parse_env_content(content).unwrap();
        assert_eq!(
            vars.get("CRMSYNC_BITRIX_WEBHOOK").unwrap(),
            "https://acme.bitrix24.ru/rest/1/abc"
        );
        assert_eq!(vars.get("CRMSYNC_IMPORT_CONCURRENCY").unwrap(), "8");
        assert_eq!(vars.get("CRMSYNC_TERMINATE_AS").unwrap(), "cancelled");
    }

    #[test]
    fn rejects_lines_without_equals() {
        assert!(parse_env_content("NOT A SETTING").is_err());
        assert!(parse_env_content("=value").is_err());
    }

    #[test]
    fn file_values_override_process_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CRMSYNC_TEST_ONLY_KEY=from-file").unwrap();

        let env = load_env(Some(file.path())).unwrap();
        assert_eq!(env.get("CRMSYNC_TEST_ONLY_KEY").as_deref(), Some("from-file"));
    }
}

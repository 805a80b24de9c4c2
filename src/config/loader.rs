//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

impl From<Vec<ValidationError>> for ConfigError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigError::Validation(errors)
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [routing]
            routing_prefix = "/a/b/"
            [[routing.pools]]
            name = "main"
            servers = ["127.0.0.1:11211"]
            [routing.route]
            type = "pool"
            pool = "main"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routing.pools[0].name, "main");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        assert!(matches!(parse_config("[routing"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn semantic_errors_are_joined() {
        let err = parse_config(
            r#"
            [routing.route]
            type = "pool"
            pool = "ghost"
            "#,
        )
        .unwrap_err();
        let ConfigError::Validation(errors) = &err else {
            panic!("expected validation error, got {err}");
        };
        assert_eq!(errors.len(), 1);
        assert!(err.to_string().contains("unknown pool 'ghost'"));
    }
}

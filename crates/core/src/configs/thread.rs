use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{ParathreadError, ParathreadResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeConfig {
    pub key: String,
    pub description: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub command: Option<Command>,
    pub script: Option<String>,
}

/// Settings of the remote status log
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoggerConfig {
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    /// Path segment grouping the messages of one run
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThreadFileConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub nodes: Vec<NodeConfig>,
    pub logger: Option<LoggerConfig>,
}

pub fn parse_thread_config(yaml_str: &str) -> ParathreadResult<ThreadFileConfig> {
    let config: ThreadFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

pub fn parse_thread_config_toml(toml_str: &str) -> ParathreadResult<ThreadFileConfig> {
    let config: ThreadFileConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Read a thread file, as TOML when its extension is `.toml` and as YAML
/// otherwise
pub fn load_thread_config(path: &Path) -> ParathreadResult<ThreadFileConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        ParathreadError::Config(format!(
            "Failed to read thread file {}: {}",
            path.display(),
            e
        ))
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_thread_config_toml(&content),
        _ => parse_thread_config(&content),
    }
}

/// JSON schema of the thread file format
pub fn thread_config_schema() -> ParathreadResult<String> {
    let schema = schemars::schema_for!(ThreadFileConfig);
    serde_json::to_string_pretty(&schema)
        .map_err(|e| ParathreadError::Config(format!("Failed to render schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_thread_file() {
        let config = parse_thread_config(
            r#"
name: nightly
nodes:
  - key: extract
    command: "echo extract"
  - key: transform
    dependencies: [extract]
    command: ["python3", "transform.py", "--fast"]
  - key: load
    dependencies: [transform, extract]
    script: scripts/load.sh
logger:
  endpoint: https://example.firebaseio.com
  authToken: secret
  ref: "2024-01-01T00:00:00"
"#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("nightly"));
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(
            config.nodes[0].command,
            Some(Command::Single("echo extract".to_string()))
        );
        assert_eq!(
            config.nodes[1].command,
            Some(Command::Multiple(vec![
                "python3".to_string(),
                "transform.py".to_string(),
                "--fast".to_string()
            ]))
        );
        assert_eq!(config.nodes[2].script.as_deref(), Some("scripts/load.sh"));

        let logger = config.logger.unwrap();
        assert_eq!(logger.auth_token.as_deref(), Some("secret"));
        assert_eq!(logger.reference.as_deref(), Some("2024-01-01T00:00:00"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse_thread_config("nodes:\n  - key: a\n    retries: 3\n");
        assert!(matches!(err, Err(ParathreadError::Yaml(_))));
    }

    #[test]
    fn test_load_toml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thread.toml");
        std::fs::write(
            &path,
            r#"
name = "toml thread"

[[nodes]]
key = "a"
command = "true"

[[nodes]]
key = "b"
dependencies = ["a"]
command = "true"
"#,
        )
        .unwrap();

        let config = load_thread_config(&path).unwrap();
        assert_eq!(config.name.as_deref(), Some("toml thread"));
        assert_eq!(config.nodes[1].dependencies, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_thread_config(&dir.path().join("absent.yml"));
        assert!(matches!(err, Err(ParathreadError::Config(_))));
    }

    #[test]
    fn test_schema_mentions_nodes() {
        let schema = thread_config_schema().unwrap();
        assert!(schema.contains("\"nodes\""));
        assert!(schema.contains("ThreadFileConfig"));
    }
}

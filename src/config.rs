use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::container::{Container, Value};
use crate::errors::{ConfigError, Result};

/// Parameters loaded from a TOML document.
///
/// ```toml
/// [parameters]
/// db_host = "localhost"
/// db_port = 5432
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ContainerConfig {
    #[serde(default)]
    pub parameters: toml::Table,
}

impl ContainerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Reading container parameters from {:?}", path);

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string_lossy().to_string(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::TomlParse(path.to_string_lossy().to_string(), e))?;

        log::debug!("Loaded {} parameters", config.parameters.len());
        Ok(config)
    }
}

/// Scalars become native values; arrays and tables stay as `toml::Value`.
fn parameter_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::new(s),
        toml::Value::Integer(i) => Value::new(i),
        toml::Value::Float(f) => Value::new(f),
        toml::Value::Boolean(b) => Value::new(b),
        toml::Value::Datetime(dt) => Value::new(dt.to_string()),
        other => Value::new(other),
    }
}

impl Container {
    /// Create a container seeded with the configured parameters
    pub fn from_config(config: &ContainerConfig) -> Result<Self> {
        let container = Self::new();
        container.load_parameters(config)?;
        Ok(container)
    }

    /// Set every configured parameter, failing on the first frozen identifier
    pub fn load_parameters(&self, config: &ContainerConfig) -> Result<()> {
        for (id, value) in &config.parameters {
            self.set(id, parameter_value(value.clone()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Invocable;
    use crate::errors::ContainerError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[parameters]
db_host = "localhost"
db_port = 5432
ratio = 0.5
debug = true
replicas = ["a", "b"]
"#;

    #[test]
    fn test_scalar_parameters() {
        let config = ContainerConfig::from_toml_str(SAMPLE).unwrap();
        let container = Container::from_config(&config).unwrap();

        assert_eq!(container.get_as::<String>("db_host").unwrap().as_str(), "localhost");
        assert_eq!(*container.get_as::<i64>("db_port").unwrap(), 5432);
        assert_eq!(*container.get_as::<f64>("ratio").unwrap(), 0.5);
        assert!(*container.get_as::<bool>("debug").unwrap());

        let replicas = container.get_as::<toml::Value>("replicas").unwrap();
        assert_eq!(replicas.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_missing_section_is_empty() {
        let config = ContainerConfig::from_toml_str("").unwrap();
        assert!(config.parameters.is_empty());
        assert!(Container::from_config(&config).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ContainerConfig::from_toml_str("[parameters\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(ref origin, _) if origin == "<inline>"));
    }

    #[test]
    fn test_load_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(SAMPLE.as_bytes())?;

        let config = ContainerConfig::load(file.path())?;
        assert_eq!(config.parameters.len(), 5);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let err = ContainerConfig::load("/nonexistent/wart/params.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_, _)));
    }

    #[test]
    fn test_load_parameters_respects_frozen_services() {
        let container = Container::new();
        container
            .set("db_host", Invocable::new(|_| Ok(Value::from("resolved"))))
            .unwrap();
        container.get("db_host").unwrap();

        let config = ContainerConfig::from_toml_str(SAMPLE).unwrap();
        let err = container.load_parameters(&config).unwrap_err();
        assert!(matches!(err, ContainerError::FrozenService(ref id) if id == "db_host"));
    }
}

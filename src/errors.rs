//! 错误类型定义
//!
//! 容器的所有操作都以 `Result` 返回，失败只影响当前调用，不会破坏其他条目。

use std::fmt::Display;
use thiserror::Error;

/// 容器操作错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 标识符未注册（`get`、`raw`、`extend`）
    #[error("Identifier `{0}` is not defined.")]
    UndefinedIdentifier(String),

    /// 已解析的共享服务不允许被重新定义
    #[error("Cannot override frozen service `{0}`.")]
    FrozenService(String),

    /// 传入 `protect` / `factory` / `extend` 的值不可调用
    #[error("{0} is not a Closure or invokable object.")]
    InvalidDefinition(String),

    /// `get_as` 的目标类型与实际存储的值不匹配
    #[error("Identifier `{id}` does not hold a value of type `{expected}`")]
    TypeMismatch {
        id: String,
        expected: &'static str,
    },

    /// 服务定义在执行时失败
    #[error("Service creation failed: {0}")]
    ServiceCreationFailed(String),

    /// 参数配置加载失败
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ContainerError {
    /// 供服务定义内部使用，包装任意失败原因
    pub fn creation(reason: impl Display) -> Self {
        Self::ServiceCreationFailed(reason.to_string())
    }
}

/// 参数配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
}

/// 容器操作的结果类型
pub type Result<T, E = ContainerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_identifier() {
        let err = ContainerError::UndefinedIdentifier("foo".to_string());
        assert_eq!(err.to_string(), "Identifier `foo` is not defined.");

        let err = ContainerError::FrozenService("foo".to_string());
        assert_eq!(err.to_string(), "Cannot override frozen service `foo`.");
    }

    #[test]
    fn test_invalid_definition_carries_context() {
        let err = ContainerError::InvalidDefinition("Service definition".to_string());
        assert_eq!(
            err.to_string(),
            "Service definition is not a Closure or invokable object."
        );
    }

    #[test]
    fn test_creation_helper() {
        let err = ContainerError::creation("database offline");
        assert!(matches!(err, ContainerError::ServiceCreationFailed(ref m) if m == "database offline"));
    }
}

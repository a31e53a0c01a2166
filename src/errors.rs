use crate::infrastructure::container::Identity;
use thiserror::Error;

/// 构建器自身返回的错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 同一标识重复注册
    #[error("{0} was already registered")]
    AlreadyRegistered(Identity),
    /// 标识没有对应的定义
    #[error("{0} was not registered")]
    NotRegistered(Identity),
    /// 按类型解析时类型索引为空
    #[error("there is no instance of type {0} registered")]
    NoInstanceOfType(&'static str),
    /// 实例的实际类型与请求的类型不一致
    #[error("{id} holds a {actual}, not a {expected}")]
    TypeMismatch {
        id: Identity,
        expected: &'static str,
        actual: &'static str,
    },
    /// 构建依赖时失败
    #[error("{id} could not resolve its dependency {dependency}: {source}")]
    DependencyFailed {
        id: Identity,
        dependency: String,
        #[source]
        source: Box<ContainerError>,
    },
    /// 可失败构建器返回了错误
    #[error("builder of {id} failed: {source}")]
    BuildFailed {
        id: Identity,
        #[source]
        source: BoxError,
    },
    /// 解析出的参数个数与调用声明的不一致
    #[error("callable takes {expected} arguments but {actual} were resolved")]
    ArityMismatch { expected: usize, actual: usize },
    /// 当前线程正在构建该标识（循环依赖）
    #[error("{id} cannot be resolved: {reason}")]
    Unresolvable { id: Identity, reason: &'static str },
}

impl ContainerError {
    pub fn is_already_registered(&self) -> bool {
        matches!(self, ContainerError::AlreadyRegistered(_))
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, ContainerError::NotRegistered(_))
    }
}

/// 启动失败：某个 manager 的 start（或主资源的预构建）返回了错误
#[derive(Debug, Error)]
#[error("manager {manager} failed to boot: {source}")]
pub struct BootError {
    pub manager: Identity,
    #[source]
    pub source: anyhow::Error,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },
}

//! 配置加载
//!
//! 配置来源按优先级从低到高：默认值、TOML 文件、环境变量。

use crate::errors::ConfigError;
use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub const ENV_EAGER: &str = "OBJECT_COMMANDER_EAGER";
pub const ENV_RELEASE_ORDER: &str = "OBJECT_COMMANDER_RELEASE_ORDER";
pub const ENV_LOG: &str = "OBJECT_COMMANDER_LOG";

/// 释放 manager 的顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOrder {
    /// 按启动顺序关闭
    #[default]
    StartOrder,
    /// 按启动的逆序关闭，依赖方先于被依赖方关闭
    Reverse,
}

impl FromStr for ReleaseOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start_order" | "start-order" | "start" => Ok(ReleaseOrder::StartOrder),
            "reverse" => Ok(ReleaseOrder::Reverse),
            _ => Err(ConfigError::InvalidValue {
                field: "release_order",
                value: s.to_string(),
            }),
        }
    }
}

/// 启动配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// start 之后立即构建 manager 的主资源；为 false 时首次 get 才构建
    pub eager: bool,
    pub release_order: ReleaseOrder,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            eager: true,
            release_order: ReleaseOrder::StartOrder,
        }
    }
}

impl BootstrapConfig {
    /// 延迟构建的配置
    pub fn lazy() -> Self {
        Self {
            eager: false,
            ..Self::default()
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParse("<string>".to_string(), e))
    }

    /// 读取 TOML 文件并应用环境变量覆盖
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead(display.clone(), e))?;
        let mut settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(display, e))?;

        settings.apply_env(&collect_env_vars())?;
        Ok(settings)
    }

    /// 应用环境变量覆盖
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(value) = env.get(ENV_EAGER) {
            self.bootstrap.eager = parse_bool(ENV_EAGER, value)?;
        }
        if let Some(value) = env.get(ENV_RELEASE_ORDER) {
            self.bootstrap.release_order = value.parse()?;
        }
        if let Some(value) = env.get(ENV_LOG) {
            self.logging.level = value.clone();
        }
        Ok(())
    }
}

/// 收集本 crate 关心的环境变量
pub fn collect_env_vars() -> HashMap<String, String> {
    [ENV_EAGER, ENV_RELEASE_ORDER, ENV_LOG]
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect()
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn test_defaults_are_eager_start_order() {
        let settings = Settings::from_toml_str("").unwrap();

        assert!(settings.bootstrap.eager);
        assert_eq!(settings.bootstrap.release_order, ReleaseOrder::StartOrder);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_parse_full_document() {
        let settings = Settings::from_toml_str(
            r#"
            [bootstrap]
            eager = false
            release_order = "reverse"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.bootstrap,
            BootstrapConfig {
                eager: false,
                release_order: ReleaseOrder::Reverse,
            }
        );
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut settings = Settings::default();
        let env = HashMap::from([
            (ENV_EAGER.to_string(), "off".to_string()),
            (ENV_RELEASE_ORDER.to_string(), "Reverse".to_string()),
            (ENV_LOG.to_string(), "trace".to_string()),
        ]);

        settings.apply_env(&env).unwrap();

        assert!(!settings.bootstrap.eager);
        assert_eq!(settings.bootstrap.release_order, ReleaseOrder::Reverse);
        assert_eq!(settings.logging.level, "trace");
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let mut settings = Settings::default();
        let env = HashMap::from([(ENV_EAGER.to_string(), "maybe".to_string())]);

        let err = settings.apply_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: ENV_EAGER, .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bootstrap]\nrelease_order = \"start_order\"\neager = true").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.bootstrap.release_order, ReleaseOrder::StartOrder);
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bootstrap\neager = ").unwrap();

        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(ref path, _) if path.contains(&file.path().display().to_string())));
    }
}

use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读格式
    #[default]
    Pretty,
    /// JSON 格式
    Json,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 过滤指令，例如 `info` 或 `object_commander=debug`
    pub level: String,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否输出 ANSI 颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            show_thread_ids: true,
            ..Self::default()
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            show_target: false,
            show_thread_ids: false,
            ansi: false,
        }
    }

    /// 创建测试环境配置
    pub fn testing() -> Self {
        Self {
            level: "error".to_string(),
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            ansi: false,
        }
    }

    /// 由 `level` 构造过滤器
    pub fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        EnvFilter::try_new(&self.level)
    }
}

/// 初始化日志系统
///
/// 设置了 `RUST_LOG` 时以它为准。全局订阅者只能设置一次，重复调用返回错误。
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.env_filter()?,
    };

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(config.ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::development().level, "debug");
        assert_eq!(LoggingConfig::production().format, LogFormat::Json);
        assert!(!LoggingConfig::testing().ansi);
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        let config = LoggingConfig {
            level: "warn,object_commander=debug".to_string(),
            ..LoggingConfig::default()
        };

        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let _ = init_logging(&LoggingConfig::testing());
        assert!(init_logging(&LoggingConfig::testing()).is_err());
    }
}

//! 日志系统模块
//!
//! 基于 tracing 生态实现宿主日志：
//!
//! - 控制台输出（Pretty 或 JSON 格式）
//! - 文件输出（tracing-appender 非阻塞写入，按时间轮转）
//! - 按 `RUST_LOG` 或配置的指令过滤
//! - 模块日志级别（[`LogLevel`]）到 tracing 级别的映射
//!
//! # 示例
//!
//! ```rust,no_run
//! use chips_host::utils::logger::{Logger, LoggerConfig};
//!
//! let _guard = Logger::init(LoggerConfig::builder().level("debug").build()).unwrap();
//! tracing::info!(module = "Core", "模块已加载");
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::core::config::LogConfig;
use crate::module::metadata::LogLevel;
use crate::utils::{HostError, Result};

/// 日志文件默认前缀
const DEFAULT_FILE_PREFIX: &str = "chips-host";

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略，无法识别时使用每天轮转
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（"trace" / "debug" / "info" / "warn" / "error"）
    pub level: String,

    /// 是否使用 JSON 格式输出
    pub json_format: bool,

    /// 是否输出到控制台
    pub console_output: bool,

    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 日志轮转策略
    pub rotation: RotationStrategy,

    /// 自定义过滤指令（EnvFilter 格式），例如 "chips_host::activation=trace"
    pub filter_directives: Option<String>,

    /// 是否启用 ANSI 颜色（仅控制台 Pretty 格式）
    pub ansi_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            rotation: RotationStrategy::Daily,
            filter_directives: None,
            ansi_colors: true,
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::default()
    }

    /// 从宿主配置的日志块创建
    pub fn from_log_config(log_config: &LogConfig) -> Self {
        Self {
            level: log_config.level.clone(),
            json_format: log_config.json_format,
            file_output: if log_config.file_output {
                log_config.log_dir.clone()
            } else {
                None
            },
            rotation: RotationStrategy::parse(&log_config.rotation),
            ..Default::default()
        }
    }
}

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 启用 JSON 格式输出
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置控制台输出
    pub fn console_output(mut self, enable: bool) -> Self {
        self.config.console_output = enable;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_output = Some(dir.into());
        self
    }

    /// 设置日志文件前缀
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, strategy: RotationStrategy) -> Self {
        self.config.rotation = strategy;
        self
    }

    /// 设置过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 启用 ANSI 颜色
    pub fn ansi_colors(mut self, enable: bool) -> Self {
        self.config.ansi_colors = enable;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

/// 日志系统守卫
///
/// 持有非阻塞写入器的 WorkerGuard。守卫被丢弃时会等待挂起的日志写完。
#[derive(Default)]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

impl LogGuard {
    /// 是否持有写入器（`try_init` 重复初始化时返回空守卫）
    pub fn is_active(&self) -> bool {
        !self._guards.is_empty()
    }
}

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// 日志系统
pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// 返回的 [`LogGuard`] 必须保持存活直到程序退出。
    ///
    /// # Errors
    ///
    /// 日志系统已初始化时返回 [`HostError::InitFailed`]。
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(HostError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let env_filter = Self::create_env_filter(&config);
        let mut guard = LogGuard::default();
        let mut layers: Vec<BoxedLayer> = Vec::new();

        if config.console_output {
            let (writer, worker) = tracing_appender::non_blocking(io::stdout());
            guard._guards.push(worker);
            layers.push(if config.json_format {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(config.ansi_colors)
                    .boxed()
            });
        }

        if let Some(ref log_dir) = config.file_output {
            let appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                log_dir,
                format!("{}.log", config.file_prefix),
            );
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard._guards.push(worker);
            layers.push(if config.json_format {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_writer(writer).with_ansi(false).boxed()
            });
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| HostError::InitFailed(format!("日志系统初始化失败: {}", e)))?;

        let _ = LOGGER_INITIALIZED.set(());
        Ok(guard)
    }

    /// 尝试初始化日志系统（不会失败）
    ///
    /// 已初始化时返回空守卫。适用于测试或多次调用初始化的场景。
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_default()
    }

    fn create_env_filter(config: &LoggerConfig) -> EnvFilter {
        // 优先使用环境变量 RUST_LOG
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

        match config.filter_directives {
            Some(ref directives) => directives
                .split(',')
                .filter_map(|d| d.trim().parse().ok())
                .fold(filter, |f, directive| f.add_directive(directive)),
            None => filter,
        }
    }
}

/// 以模块身份输出一条日志
///
/// [`LogLevel::Critical`] 映射为 ERROR 级别并附带 `critical = true` 字段。
pub fn emit(level: LogLevel, module: &str, message: &str) {
    match level {
        LogLevel::Verbose => tracing::debug!(module = %module, "{}", message),
        LogLevel::Info => tracing::info!(module = %module, "{}", message),
        LogLevel::Warning => tracing::warn!(module = %module, "{}", message),
        LogLevel::Error => tracing::error!(module = %module, "{}", message),
        LogLevel::Critical => tracing::error!(module = %module, critical = true, "{}", message),
    }
}

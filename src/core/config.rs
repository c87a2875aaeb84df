//! 宿主配置
//!
//! 定义宿主的配置结构和加载逻辑。配置文件可以是 YAML 或 JSON，
//! 按扩展名区分（`.json` 为 JSON，其余按 YAML 解析）。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{HostError, Result};

/// 应用信息配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// 应用名称
    #[serde(default = "default_app_name")]
    pub name: String,

    /// 应用版本号
    #[serde(default = "default_app_version")]
    pub version: i32,
}

fn default_app_name() -> String {
    "chips-host".to_string()
}

fn default_app_version() -> i32 {
    1
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略（`daily` / `hourly` / `never`）
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 模块加载配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 启动时按顺序加载的模块路径
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// 任一模块加载失败时是否中止批量加载
    #[serde(default)]
    pub fail_fast: bool,
}

/// 宿主配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 应用信息
    #[serde(default)]
    pub application: ApplicationConfig,

    /// 模块加载配置
    #[serde(default)]
    pub modules: ModuleConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl HostConfig {
    /// 创建配置构建器
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::new()
    }

    /// 从文件加载配置
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HostError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&content, is_json(&path))?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 从字符串解析配置
    pub fn parse(content: &str, json: bool) -> Result<Self> {
        let config = if json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: HostConfig) {
        // 只覆盖非默认值的配置
        if other.application.name != default_app_name() {
            self.application.name = other.application.name;
        }
        if other.application.version != default_app_version() {
            self.application.version = other.application.version;
        }
        if !other.modules.paths.is_empty() {
            self.modules.paths.extend(other.modules.paths);
        }
        if other.modules.fail_fast {
            self.modules.fail_fast = true;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.logging.rotation != default_rotation() {
            self.logging.rotation = other.logging.rotation;
        }
        if other.dev_mode {
            self.dev_mode = true;
        }
    }
}

fn is_json(path: &std::path::Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置应用名称
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.application.name = name.into();
        self
    }

    /// 设置应用版本号
    pub fn app_version(mut self, version: i32) -> Self {
        self.config.application.version = version;
        self
    }

    /// 添加启动时加载的模块
    pub fn module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.modules.paths.push(path.into());
        self
    }

    /// 任一模块加载失败即中止
    pub fn fail_fast(mut self) -> Self {
        self.config.modules.fail_fast = true;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> HostConfig {
        self.config
    }
}

//! # Chips Host - 薯片模块宿主
//!
//! 薯片模块宿主是模块化应用的运行时核心，提供以下功能：
//!
//! - **模块注册表**: 按名称和 UUID 双键索引已加载的模块
//! - **接口子注册表**: 每个模块按名称和 UUID 索引自己提供的接口
//! - **激活协议**: 两阶段切换某项能力的默认实现，即时停用
//! - **事件通道**: 生命周期信号的同步发布/订阅
//! - **配置与日志**: YAML/JSON 配置加载，基于 tracing 的结构化日志
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use chips_host::{Application, DylibLoader, HostConfig, HostModule};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = Application::new(HostConfig::default(), DylibLoader::new());
//!     app.register_module_instance(HostModule::new())?;
//!     app.register_module("modules/librenderer.so")?;
//!
//!     let renderer = app.get_interface("Renderer")?;
//!     app.activate_interface(&renderer)?;
//!     app.process_pending_activations();
//!
//!     assert!(app.get_active_interface("Renderer").is_ok());
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 模块协议、接口协议、注册表和加载器
//! - `activation` - 待激活队列与激活目录
//! - `event` - 同步事件通道
//! - `api` - 应用编排器与内置模块
//! - `core` - 宿主配置
//! - `utils` - 错误类型、标识工具和日志系统

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod activation;
pub mod api;
pub mod core;
pub mod event;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use api::{Application, BatchReport, HostModule, LogRecord, LogSink, LOG_MANAGER_UUID};
pub use event::{ApplicationEvents, EventHandler, HandlerId};
pub use module::{
    DylibLoader, Interface, InterfaceDescriptor, InterfaceRef, InterfaceState, Key, LogLevel,
    Module, ModuleHandle, ModuleInfo, ModuleLoader, ModuleState, StaticLoader,
};

pub use crate::core::config::{HostConfig, HostConfigBuilder};
pub use utils::logger::{LogGuard, Logger, LoggerConfig};
pub use utils::{error_code, ErrorKind, HostError, Result};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

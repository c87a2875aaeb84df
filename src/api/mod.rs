//! API 模块
//!
//! 宿主对外提供的入口。
//!
//! # 模块概览
//!
//! - `application`: [`Application`] 编排器，注册表与激活协议的唯一入口
//! - `host_module`: [`HostModule`] 宿主内置模块，负责日志缓存与重放
//!
//! # 示例
//!
//! ```rust,no_run
//! use chips_host::api::Application;
//! use chips_host::core::HostConfig;
//! use chips_host::module::DylibLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HostConfig::from_file("chips.yaml").await?;
//!     let app = Application::new(HostConfig::default(), DylibLoader::new());
//!
//!     let report = app.set_config(config);
//!     app.initialize()?;
//!     println!("已加载 {} 个模块", report.loaded.len());
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod host_module;

pub use application::{Application, BatchReport};
pub use host_module::{
    HostModule, LogRecord, LogSink, HOST_MODULE_UUID, LOG_MANAGER_NAME, LOG_MANAGER_UUID,
};

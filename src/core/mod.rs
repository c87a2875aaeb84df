//! 核心模块
//!
//! 宿主配置。

pub mod config;

pub use config::{ApplicationConfig, HostConfig, HostConfigBuilder, LogConfig, ModuleConfig};

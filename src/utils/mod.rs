//! 工具模块
//!
//! 包含错误类型、标识工具和日志系统。

pub mod error;
pub mod id;
pub mod logger;

// 重导出常用类型
pub use error::{error_code, ErrorKind, HostError, Result};
pub use id::{generate_uuid, is_valid_name, parse_uuid, uuid_from_words};
pub use logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

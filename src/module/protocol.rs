//! 模块协议
//!
//! 每个可加载单元都实现 [`Module`]：提供唯一的名称和 UUID、
//! 按顺序调用的初始化钩子、镜像顺序的反初始化钩子、属性查询和日志输出。
//!
//! 钩子在宿主不持有注册表锁的情况下调用，模块可以在钩子中回调
//! [`Application`] 注册或激活自己的接口。

use std::sync::Arc;

use uuid::Uuid;

use super::metadata::LogLevel;
use crate::api::Application;
use crate::utils::{logger, Result};

/// 可加载模块
///
/// 所有钩子都接收 `&self`，需要保存状态的模块自行使用内部可变性。
///
/// # Example
///
/// ```
/// use chips_host::module::Module;
/// use chips_host::utils::id::uuid_from_words;
/// use uuid::Uuid;
///
/// struct Renderer;
///
/// impl Module for Renderer {
///     fn name(&self) -> &str {
///         "Renderer"
///     }
///
///     fn uuid(&self) -> Uuid {
///         uuid_from_words(0x5F1A_0001, 0, 0, 1)
///     }
/// }
/// ```
pub trait Module: Send + Sync + 'static {
    /// 模块名称（在注册表中唯一）
    fn name(&self) -> &str;

    /// 模块 UUID（在注册表中唯一）
    fn uuid(&self) -> Uuid;

    /// 库初始化，注册后第一个调用
    fn init_library(&self, _app: &Arc<Application>) -> Result<()> {
        Ok(())
    }

    /// 管理器初始化，通常在这里创建并注册接口
    fn init_managers(&self, _app: &Arc<Application>) -> Result<()> {
        Ok(())
    }

    /// 属性初始化
    fn init_properties(&self, _app: &Arc<Application>) -> Result<()> {
        Ok(())
    }

    /// 反射初始化
    fn init_reflection(&self, _app: &Arc<Application>) -> Result<()> {
        Ok(())
    }

    /// 反射反初始化
    fn deinit_reflection(&self) {}

    /// 管理器反初始化
    fn deinit_managers(&self) {}

    /// 库反初始化，注销时最后调用
    fn deinit_library(&self) {}

    /// 查询模块属性
    fn property(&self, _name: &str) -> Option<serde_json::Value> {
        None
    }

    /// 输出一条日志
    fn log(&self, level: LogLevel, message: &str) {
        logger::emit(level, self.name(), message);
    }

    /// 输出详细日志
    fn log_verbose(&self, message: &str) {
        self.log(LogLevel::Verbose, message);
    }

    /// 输出信息日志
    fn log_info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// 输出警告日志
    fn log_warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    /// 输出错误日志
    fn log_error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// 输出严重错误日志
    fn log_critical(&self, message: &str) {
        self.log(LogLevel::Critical, message);
    }
}

/// 比较两个模块是否为同一个实例
pub fn same_module(a: &Arc<dyn Module>, b: &Arc<dyn Module>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

//! 模块加载器
//!
//! 负责打开可加载单元并完成握手：解析约定的入口符号，调用工厂函数得到模块实例。
//!
//! - [`DylibLoader`] 通过 libloading 打开动态库
//! - [`StaticLoader`] 把路径映射到进程内的工厂函数，用于内置模块和测试
//!
//! 动态库需要用 [`declare_module!`](crate::declare_module) 导出工厂函数。

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info, warn};

use super::protocol::Module;
use crate::utils::{HostError, Result};

/// 约定的入口符号名
pub const MODULE_ENTRY_SYMBOL: &str = "_chips_module";

/// 入口函数签名
///
/// 返回指向 `Box<Arc<dyn Module>>` 的裸指针，空指针表示没有模块描述。
pub type ModuleFactory = unsafe extern "C" fn() -> *mut c_void;

/// 加载结果
pub struct LoadedModule {
    /// 模块实例
    pub module: Arc<dyn Module>,

    /// 动态库句柄（静态模块为空）
    ///
    /// 必须比模块中所有代码的引用活得更久。
    pub library: Option<Library>,
}

impl LoadedModule {
    /// 包装进程内的模块
    pub fn in_process(module: Arc<dyn Module>) -> Self {
        Self {
            module,
            library: None,
        }
    }
}

/// 模块加载器
pub trait ModuleLoader: Send + Sync {
    /// 打开可加载单元并完成握手
    ///
    /// # Errors
    ///
    /// - [`HostError::LoadFailed`]：无法打开
    /// - [`HostError::ProtocolMismatch`]：缺少入口符号
    /// - [`HostError::NullDescriptor`]：入口函数没有返回模块
    fn load(&self, path: &Path) -> Result<LoadedModule>;
}

/// 动态库加载器
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl DylibLoader {
    /// 创建加载器
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        let shown = path.display().to_string();
        debug!(path = %shown, "打开动态库");

        // SAFETY: 加载任意动态库会执行其初始化代码，调用方负责只加载可信的模块
        let library = unsafe { Library::new(path) }.map_err(|e| HostError::LoadFailed {
            path: shown.clone(),
            reason: e.to_string(),
        })?;

        let symbol_name = format!("{}\0", MODULE_ENTRY_SYMBOL);
        // SAFETY: 入口符号的签名由 declare_module! 保证
        let factory: ModuleFactory = unsafe {
            library
                .get::<ModuleFactory>(symbol_name.as_bytes())
                .map(|symbol| *symbol)
        }
        .map_err(|e| {
            warn!(path = %shown, error = %e, "缺少模块入口符号");
            HostError::ProtocolMismatch {
                path: shown.clone(),
                symbol: MODULE_ENTRY_SYMBOL.to_string(),
            }
        })?;

        // SAFETY: 工厂函数来自仍然打开的库
        let raw = unsafe { factory() };
        if raw.is_null() {
            return Err(HostError::NullDescriptor(shown));
        }

        // SAFETY: 非空返回值由 declare_module! 通过 Box::into_raw 产生
        let boxed = unsafe { Box::from_raw(raw as *mut Arc<dyn Module>) };
        info!(path = %shown, module = %boxed.name(), "动态库握手完成");

        Ok(LoadedModule {
            module: *boxed,
            library: Some(library),
        })
    }
}

/// 导出模块入口函数
///
/// 参数表达式的值必须是 `Arc<T>`，其中 `T: Module`。
///
/// ```ignore
/// chips_host::declare_module!(std::sync::Arc::new(MyModule::default()));
/// ```
#[macro_export]
macro_rules! declare_module {
    ($constructor:expr) => {
        #[no_mangle]
        pub extern "C" fn _chips_module() -> *mut ::std::ffi::c_void {
            let module: ::std::sync::Arc<dyn $crate::module::Module> = $constructor;
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(module)) as *mut ::std::ffi::c_void
        }
    };
}

type StaticFactory = Box<dyn Fn() -> Option<Arc<dyn Module>> + Send + Sync>;

enum StaticEntry {
    Factory(StaticFactory),
    MissingSymbol,
}

/// 静态加载器
///
/// 把路径映射到进程内的工厂函数。未登记的路径按"无法打开"处理。
#[derive(Default)]
pub struct StaticLoader {
    entries: HashMap<PathBuf, StaticEntry>,
}

impl StaticLoader {
    /// 创建空的静态加载器
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个模块工厂
    pub fn with_module<F>(mut self, path: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Module> + Send + Sync + 'static,
    {
        self.entries.insert(
            path.into(),
            StaticEntry::Factory(Box::new(move || Some(factory()))),
        );
        self
    }

    /// 登记一个返回空描述的工厂
    pub fn with_null_descriptor(mut self, path: impl Into<PathBuf>) -> Self {
        let factory: StaticFactory = Box::new(|| None);
        self.entries.insert(path.into(), StaticEntry::Factory(factory));
        self
    }

    /// 登记一个能打开但缺少入口符号的单元
    pub fn with_missing_symbol(mut self, path: impl Into<PathBuf>) -> Self {
        self.entries.insert(path.into(), StaticEntry::MissingSymbol);
        self
    }

    /// 已登记的路径数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有登记任何路径
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ModuleLoader for StaticLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        let shown = path.display().to_string();
        match self.entries.get(path) {
            None => Err(HostError::LoadFailed {
                path: shown,
                reason: "未登记的静态模块".to_string(),
            }),
            Some(StaticEntry::MissingSymbol) => Err(HostError::ProtocolMismatch {
                path: shown,
                symbol: MODULE_ENTRY_SYMBOL.to_string(),
            }),
            Some(StaticEntry::Factory(factory)) => factory()
                .map(LoadedModule::in_process)
                .ok_or(HostError::NullDescriptor(shown)),
        }
    }
}

//! 应用编排器
//!
//! [`Application`] 组合模块注册表、待激活队列、激活目录和事件通道，
//! 是宿主和模块访问注册表与激活协议的唯一入口。
//!
//! # 锁
//!
//! - 注册表锁（`RwLock`）总是最先获取，且在调用任何模块钩子或接口回调之前释放
//! - 队列锁和目录锁相互独立，持有目录锁时绝不获取队列锁
//!
//! # 示例
//!
//! ```
//! use chips_host::api::{Application, HostModule};
//! use chips_host::core::HostConfig;
//! use chips_host::module::StaticLoader;
//!
//! let app = Application::new(HostConfig::default(), StaticLoader::new());
//! let handle = app.register_module_instance(HostModule::new()).unwrap();
//! assert_eq!(app.module_count(), 1);
//!
//! app.unregister_module(&handle).unwrap();
//! assert_eq!(app.module_count(), 0);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libloading::Library;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::activation::{ActiveDirectory, PendingQueue};
use crate::core::config::HostConfig;
use crate::event::ApplicationEvents;
use crate::module::index::IndexEntry;
use crate::module::lifecycle::{self, InitStage};
use crate::module::protocol::same_module;
use crate::module::registry::ModuleEntry;
use crate::module::{
    Interface, InterfaceDescriptor, InterfaceRef, InterfaceState, Key, LoadedModule, Module,
    ModuleHandle, ModuleInfo, ModuleLoader, ModuleRegistry, ModuleState, RegistrySnapshot,
};
use crate::utils::{id, HostError, Result};

/// 批量加载结果
#[derive(Debug, Default)]
pub struct BatchReport {
    /// 成功注册的模块
    pub loaded: Vec<ModuleHandle>,

    /// 失败的路径及原因
    pub failed: Vec<(PathBuf, HostError)>,

    /// 是否因 `fail_fast` 提前中止
    pub aborted: bool,
}

impl BatchReport {
    /// 是否全部成功
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

/// 应用编排器
pub struct Application {
    /// 宿主配置
    config: RwLock<HostConfig>,

    /// 模块加载器
    loader: Box<dyn ModuleLoader>,

    /// 模块注册表
    registry: RwLock<ModuleRegistry>,

    /// 待激活队列
    pending: PendingQueue,

    /// 激活目录
    directory: ActiveDirectory,

    /// 应用级事件
    events: ApplicationEvents,

    initialized: AtomicBool,
    active: AtomicBool,
    has_to_stop: AtomicBool,

    /// 已注销模块的动态库，应用销毁时才卸载
    ///
    /// 必须是最后一个字段，保证其他字段中的模块代码引用先被释放。
    retired_libraries: Mutex<Vec<Library>>,
}

impl Application {
    /// 创建应用
    pub fn new(config: HostConfig, loader: impl ModuleLoader + 'static) -> Arc<Self> {
        info!(
            app = %config.application.name,
            version = config.application.version,
            "创建应用 (chips-host v{})",
            crate::VERSION
        );
        Arc::new(Self {
            config: RwLock::new(config),
            loader: Box::new(loader),
            registry: RwLock::new(ModuleRegistry::new()),
            pending: PendingQueue::new(),
            directory: ActiveDirectory::new(),
            events: ApplicationEvents::default(),
            initialized: AtomicBool::new(false),
            active: AtomicBool::new(false),
            has_to_stop: AtomicBool::new(false),
            retired_libraries: Mutex::new(Vec::new()),
        })
    }

    // ==================== 模块注册 ====================

    /// 加载并注册模块
    ///
    /// 握手成功且名称、UUID 都不冲突后依次调用四个初始化钩子。
    /// 任一钩子失败时模块被拆除并返回 [`HostError::InitFailed`]。
    pub fn register_module(self: &Arc<Self>, path: impl AsRef<Path>) -> Result<ModuleHandle> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(HostError::NullArgument("模块路径".to_string()));
        }

        info!(path = %path.display(), "注册模块");
        let loaded = self.loader.load(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, code = e.error_code(), "模块加载失败");
            e
        })?;
        self.install(loaded, Some(path.to_path_buf()))
    }

    /// 注册进程内的模块实例
    pub fn register_module_instance(self: &Arc<Self>, module: Arc<dyn Module>) -> Result<ModuleHandle> {
        self.install(LoadedModule::in_process(module), None)
    }

    fn install(self: &Arc<Self>, loaded: LoadedModule, path: Option<PathBuf>) -> Result<ModuleHandle> {
        let handle = self.registry.write().insert(loaded, path)?;

        let (slot, module) = {
            let registry = self.registry.read();
            let slot = registry.resolve_handle(&handle)?;
            let module = registry
                .get_slot(slot)
                .map(|e| Arc::clone(&e.module))
                .ok_or_else(|| HostError::NotFound(format!("模块 {}", handle)))?;
            (slot, module)
        };

        let mut completed = Vec::with_capacity(InitStage::SEQUENCE.len());
        for stage in InitStage::SEQUENCE {
            if let Err(e) = lifecycle::run_init_stage(&module, stage, self) {
                drop(module);
                if let Err(teardown) = self.teardown(&handle, Some(&completed)) {
                    error!(module = %handle, error = %teardown, "初始化失败后拆除模块出错");
                }
                return Err(e);
            }
            completed.push(stage);
            self.registry.write().set_state(slot, stage.resulting_state())?;
        }

        info!(module = %handle, "模块初始化完成");
        Ok(handle)
    }

    /// 注销模块
    ///
    /// 先停用并反初始化模块的所有接口，再按反射 → 管理器 → 库的顺序调用反初始化钩子，
    /// 最后从注册表移除。
    pub fn unregister_module(&self, handle: &ModuleHandle) -> Result<()> {
        if handle.is_empty() {
            return Err(HostError::NullArgument("模块句柄".to_string()));
        }
        self.teardown(handle, None)
    }

    fn teardown(&self, handle: &ModuleHandle, completed: Option<&[InitStage]>) -> Result<()> {
        let (slot, module, descriptors, completed) = {
            let mut registry = self.registry.write();
            let slot = registry.resolve_handle(handle)?;
            let entry = registry
                .get_slot_mut(slot)
                .ok_or_else(|| HostError::NotFound(format!("模块 {}", handle)))?;
            if !entry.state.can_deinitialize() {
                return Err(HostError::InvalidState(format!(
                    "模块 {} 正在反初始化",
                    handle
                )));
            }
            let completed = completed
                .map(<[InitStage]>::to_vec)
                .unwrap_or_else(|| InitStage::completed_for(entry.state));
            entry.state = ModuleState::Deinitializing;
            (
                slot,
                Arc::clone(&entry.module),
                entry.interfaces.descriptors(),
                completed,
            )
        };

        info!(module = %handle, interfaces = descriptors.len(), "开始注销模块");
        for descriptor in &descriptors {
            self.retire_interface(descriptor);
        }

        lifecycle::run_deinit(&module, &completed);
        drop(module);

        let removed = self.registry.write().remove(slot);
        if let Some(entry) = removed {
            self.dispose_entry(entry);
        }

        info!(module = %handle, "模块已注销");
        Ok(())
    }

    fn dispose_entry(&self, mut entry: ModuleEntry) {
        // 反初始化钩子中新注册的接口
        for descriptor in entry.interfaces.drain() {
            self.retire_interface(&descriptor);
        }
        entry.state = ModuleState::Unloaded;
        if let Some(library) = entry.library.take() {
            self.retired_libraries.lock().push(library);
        }
    }

    /// 按注册的逆序注销所有模块，返回成功注销的数量
    pub fn unload_all(&self) -> usize {
        let handles: Vec<ModuleHandle> = {
            let registry = self.registry.read();
            registry
                .iter()
                .map(|(slot, e)| ModuleHandle::new(e.module.name(), e.module.uuid(), slot))
                .collect()
        };

        handles
            .iter()
            .rev()
            .filter(|handle| match self.unregister_module(handle) {
                Ok(()) => true,
                Err(e) => {
                    warn!(module = %handle, error = %e, "注销模块失败");
                    false
                }
            })
            .count()
    }

    // ==================== 接口注册 ====================

    /// 注册接口
    ///
    /// 接口加入所属模块的子注册表；如果接口尚未初始化，随后调用它的 `initialize`。
    pub fn register_interface(&self, service: Arc<dyn Interface>) -> Result<Arc<InterfaceDescriptor>> {
        let owner = Self::declared_owner(service.as_ref())?;

        let descriptor = {
            let mut registry = self.registry.write();
            let entry = Self::owning_entry(&mut registry, service.as_ref(), &owner)?;
            if !entry.state.can_deinitialize() {
                return Err(HostError::InvalidState(format!(
                    "模块 '{}' 正在注销，不能注册接口 '{}'",
                    owner.name(),
                    service.interface_name()
                )));
            }
            let descriptor = Arc::new(InterfaceDescriptor::new(Arc::clone(&service), &owner));
            entry.interfaces.insert(Arc::clone(&descriptor))?;
            descriptor
        };

        if !service.is_initialized() {
            let outcome = catch_unwind(AssertUnwindSafe(|| service.initialize(&owner)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("initialize panic".to_string()),
            };
            if let Some(reason) = failure {
                warn!(interface = %descriptor.name(), reason = %reason, "接口初始化失败，回滚注册");
                self.remove_from_subregistry(&owner, &service);
                descriptor.set_state(InterfaceState::Deinitialized);
                return Err(HostError::InitFailed(format!(
                    "接口 '{}': {}",
                    descriptor.name(),
                    reason
                )));
            }
        }

        descriptor.set_state(InterfaceState::Initialized);
        info!(
            interface = %descriptor.name(),
            uuid = %descriptor.uuid(),
            module = %descriptor.module_name(),
            "接口已注册"
        );
        Ok(descriptor)
    }

    /// 注销接口
    ///
    /// 激活中的接口先停用，已初始化的接口随后反初始化，最后把子注册表中的槽位置为墓碑。
    pub fn unregister_interface(&self, service: &Arc<dyn Interface>) -> Result<()> {
        let owner = Self::declared_owner(service.as_ref())?;

        let descriptor = {
            let mut registry = self.registry.write();
            let entry = Self::owning_entry(&mut registry, service.as_ref(), &owner)?;
            entry
                .interfaces
                .find_service(service)
                .map(|(_, d)| Arc::clone(d))
                .ok_or_else(|| {
                    HostError::NotFound(format!(
                        "模块 '{}' 中的接口 '{}'",
                        owner.name(),
                        service.interface_name()
                    ))
                })?
        };

        self.retire_interface(&descriptor);
        self.remove_from_subregistry(&owner, service);
        info!(interface = %descriptor.name(), module = %owner.name(), "接口已注销");
        Ok(())
    }

    fn declared_owner(service: &dyn Interface) -> Result<Arc<dyn Module>> {
        let name = service.interface_name();
        let uuid = service.interface_uuid();
        if !id::is_valid_name(name) || uuid.is_nil() {
            return Err(HostError::NullInterface(format!(
                "name='{}', uuid={}",
                name, uuid
            )));
        }
        service
            .owner()
            .ok_or_else(|| HostError::NoOwningModule(name.to_string()))
    }

    fn owning_entry<'r>(
        registry: &'r mut ModuleRegistry,
        service: &dyn Interface,
        owner: &Arc<dyn Module>,
    ) -> Result<&'r mut ModuleEntry> {
        let (_, entry) = registry.get_by_uuid_mut(&owner.uuid()).ok_or_else(|| {
            HostError::ModuleNotRegistered {
                interface: service.interface_name().to_string(),
                module: owner.name().to_string(),
            }
        })?;
        if !same_module(&entry.module, owner) {
            return Err(HostError::ModuleMismatch {
                interface: service.interface_name().to_string(),
                module_uuid: owner.uuid(),
            });
        }
        Ok(entry)
    }

    fn remove_from_subregistry(&self, owner: &Arc<dyn Module>, service: &Arc<dyn Interface>) {
        let mut registry = self.registry.write();
        if let Some((_, entry)) = registry.get_by_uuid_mut(&owner.uuid()) {
            if let Some((slot, _)) = entry.interfaces.find_service(service) {
                entry.interfaces.tombstone(slot);
            }
        }
    }

    /// 取消排队、停用并反初始化接口
    fn retire_interface(&self, descriptor: &Arc<InterfaceDescriptor>) {
        if self.pending.remove(descriptor) {
            debug!(interface = %descriptor.name(), "取消待激活请求");
        }
        if descriptor.is_active() {
            self.directory.deactivate_descriptor(descriptor);
        }
        if descriptor.state().needs_deinitialize() {
            let service = Arc::clone(descriptor.service());
            if catch_unwind(AssertUnwindSafe(|| service.deinitialize())).is_err() {
                error!(interface = %descriptor.name(), "接口反初始化 panic");
            }
        }
        descriptor.set_queued(false);
        descriptor.set_state(InterfaceState::Deinitialized);
    }

    // ==================== 激活协议 ====================

    /// 请求激活接口
    ///
    /// 接口进入待激活队列并发出 `OnInterfaceActivation` 通知；重复请求不产生新的条目。
    /// 真正的提升由 [`Application::process_pending_activations`] 完成。
    pub fn activate_interface(&self, descriptor: &Arc<InterfaceDescriptor>) -> Result<()> {
        if !id::is_valid_name(descriptor.name()) || descriptor.uuid().is_nil() {
            return Err(HostError::NullInterface(descriptor.name().to_string()));
        }
        if !descriptor.state().can_activate() {
            return Err(HostError::InvalidState(format!(
                "接口 '{}' 已注销",
                descriptor.name()
            )));
        }

        let requests = &self.events.interface_activation;
        if self.pending.enqueue(descriptor, |request| requests.post(request)) {
            requests.drain();
        }
        Ok(())
    }

    /// 把待激活队列中的接口提升为默认实现，返回提升的数量
    pub fn process_pending_activations(&self) -> usize {
        let requests = self.pending.take_all();
        let mut promoted = 0;

        for request in requests {
            let Some(descriptor) = request.upgrade() else {
                debug!(interface = %request.name(), "待激活的接口已注销");
                continue;
            };
            descriptor.set_queued(false);
            if !descriptor.state().can_activate() {
                continue;
            }
            self.directory.promote(&descriptor);
            promoted += 1;
        }

        if promoted > 0 {
            debug!(promoted, "待激活队列处理完成");
        }
        promoted
    }

    /// 停用接口
    pub fn deactivate_interface<'k>(&self, key: impl Into<Key<'k>>) -> Result<()> {
        let key = Self::checked_key(key.into())?;
        self.directory.deactivate(&key)
    }

    /// 获取当前激活的接口
    pub fn get_active_interface<'k>(&self, key: impl Into<Key<'k>>) -> Result<Arc<InterfaceDescriptor>> {
        let key = Self::checked_key(key.into())?;
        self.directory.get(&key)
    }

    /// 当前待激活的请求
    pub fn pending_activations(&self) -> Vec<InterfaceRef> {
        self.pending.snapshot()
    }

    fn checked_key(key: Key<'_>) -> Result<Key<'_>> {
        if key.is_valid() {
            Ok(key)
        } else {
            Err(HostError::NullArgument(format!("查找键 {}", key)))
        }
    }

    // ==================== 查询 ====================

    /// 查找接口
    ///
    /// 优先返回激活中的实现，否则按模块注册顺序返回第一个匹配的接口。
    pub fn get_interface<'k>(&self, key: impl Into<Key<'k>>) -> Result<Arc<InterfaceDescriptor>> {
        let key = Self::checked_key(key.into())?;
        if let Ok(active) = self.directory.get(&key) {
            return Ok(active);
        }

        let registry = self.registry.read();
        let found = registry
            .iter()
            .find_map(|(_, entry)| entry.interfaces.find(&key).map(|(_, d)| Arc::clone(d)));
        found.ok_or_else(|| HostError::NotFound(format!("接口 {}", key)))
    }

    /// 在指定模块中查找接口
    pub fn get_interface_in<'k, 'm>(
        &self,
        key: impl Into<Key<'k>>,
        module: impl Into<Key<'m>>,
    ) -> Result<Arc<InterfaceDescriptor>> {
        let key = Self::checked_key(key.into())?;
        let module = Self::checked_key(module.into())?;

        let registry = self.registry.read();
        let (_, entry) = registry.get(&module)?;
        entry
            .interfaces
            .find(&key)
            .map(|(_, d)| Arc::clone(d))
            .ok_or_else(|| HostError::NotFound(format!("模块 {} 中的接口 {}", module, key)))
    }

    /// 查找模块
    pub fn get_module<'k>(&self, key: impl Into<Key<'k>>) -> Result<Arc<dyn Module>> {
        let key = Self::checked_key(key.into())?;
        let registry = self.registry.read();
        registry.get(&key).map(|(_, e)| Arc::clone(&e.module))
    }

    /// 模块运行时信息
    pub fn module_info<'k>(&self, key: impl Into<Key<'k>>) -> Result<ModuleInfo> {
        let key = Self::checked_key(key.into())?;
        let registry = self.registry.read();
        registry.get(&key).map(|(_, e)| e.info())
    }

    /// 已注册的模块数量
    pub fn module_count(&self) -> usize {
        self.registry.read().len()
    }

    /// 按注册顺序列出模块
    pub fn modules(&self) -> Vec<ModuleInfo> {
        self.registry.read().iter().map(|(_, e)| e.info()).collect()
    }

    /// 注册表快照
    pub fn registry_snapshot(&self) -> RegistrySnapshot {
        self.registry.read().snapshot()
    }

    /// 激活目录快照
    pub fn active_snapshot(&self) -> Vec<IndexEntry> {
        self.directory.snapshot()
    }

    /// 校验所有双索引的一致性
    pub fn check_consistency(&self) -> Result<()> {
        self.registry.read().check_consistency()?;
        self.directory.check_consistency()
    }

    // ==================== 事件与应用生命周期 ====================

    /// 应用级事件
    pub fn events(&self) -> &ApplicationEvents {
        &self.events
    }

    /// 初始化应用，触发 `OnInitialization(true)`
    pub fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(HostError::InvalidState("应用已初始化".to_string()));
        }
        info!(modules = self.module_count(), "应用初始化");
        self.events.initialization.trigger(&true)?;
        Ok(())
    }

    /// 反初始化应用，触发 `OnInitialization(false)`
    pub fn deinitialize(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Err(HostError::InvalidState("应用未初始化".to_string()));
        }
        info!("应用反初始化");
        self.events.initialization.trigger(&false)?;
        Ok(())
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// 应用获得激活，触发 `OnActivation(true)`
    ///
    /// 已处于激活状态时不做任何事。
    pub fn on_activate(&self) -> Result<()> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("应用获得激活");
        self.events.activation.trigger(&true)?;
        Ok(())
    }

    /// 应用失去激活，触发 `OnActivation(false)`
    ///
    /// 未处于激活状态时不做任何事。
    pub fn on_deactivate(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("应用失去激活");
        self.events.activation.trigger(&false)?;
        Ok(())
    }

    /// 应用是否处于激活状态
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 开始运行
    pub fn start_application(&self) {
        self.has_to_stop.store(false, Ordering::Release);
        info!(app = %self.app_name(), "应用开始运行");
    }

    /// 请求停止，首次调用时触发 `OnClose`
    pub fn stop_application(&self) -> Result<()> {
        if self.has_to_stop.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(app = %self.app_name(), "应用请求停止");
        self.events.close.trigger(&())?;
        Ok(())
    }

    /// 是否已请求停止
    pub fn has_to_stop(&self) -> bool {
        self.has_to_stop.load(Ordering::Acquire)
    }

    // ==================== 配置 ====================

    /// 设置配置并按顺序注册其中列出的模块
    ///
    /// 单个模块失败只记录告警并继续；配置了 `fail_fast` 时遇到第一个失败即停止。
    pub fn set_config(self: &Arc<Self>, config: HostConfig) -> BatchReport {
        let paths = config.modules.paths.clone();
        let fail_fast = config.modules.fail_fast;
        *self.config.write() = config;

        let mut report = BatchReport::default();
        for path in paths {
            match self.register_module(&path) {
                Ok(handle) => report.loaded.push(handle),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "跳过加载失败的模块");
                    report.failed.push((path, e));
                    if fail_fast {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            aborted = report.aborted,
            "配置的模块加载完成"
        );
        report
    }

    /// 当前配置
    pub fn config(&self) -> HostConfig {
        self.config.read().clone()
    }

    /// 应用名称
    pub fn app_name(&self) -> String {
        self.config.read().application.name.clone()
    }

    /// 应用版本号
    pub fn app_version(&self) -> i32 {
        self.config.read().application.version
    }

    /// 编译配置
    pub fn compilation_info() -> &'static str {
        if cfg!(debug_assertions) {
            "DEBUG"
        } else {
            "RELEASE"
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        let count = self.unload_all();
        if count > 0 {
            debug!(count, "应用销毁时注销剩余模块");
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("app", &self.app_name())
            .field("modules", &self.module_count())
            .field("active_interfaces", &self.directory.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

//! 接口与接口子注册表
//!
//! 一个 [`Interface`] 是模块提供的一份服务实现。注册后由所属模块的
//! [`InterfaceRegistry`] 以 [`InterfaceDescriptor`] 的形式独占持有；
//! 激活目录、待激活队列和事件负载只持有 [`InterfaceRef`]（弱引用）。

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use super::index::{DualIndex, IndexEntry, SlotId};
use super::metadata::{InterfaceState, Key};
use super::protocol::Module;
use crate::api::host_module::LogSink;
use crate::utils::Result;

/// 服务接口
///
/// 实现者通常以 `Weak<dyn Module>` 保存所属模块，避免与模块形成引用环。
pub trait Interface: Send + Sync + 'static {
    /// 接口名称（在所属模块内唯一）
    fn interface_name(&self) -> &str;

    /// 接口 UUID（在所属模块内唯一）
    fn interface_uuid(&self) -> Uuid;

    /// 所属模块
    fn owner(&self) -> Option<Arc<dyn Module>>;

    /// 是否已经初始化过
    ///
    /// 返回 `true` 时注册流程不会再调用 [`Interface::initialize`]。
    fn is_initialized(&self) -> bool {
        false
    }

    /// 初始化
    fn initialize(&self, _owner: &Arc<dyn Module>) -> Result<()> {
        Ok(())
    }

    /// 反初始化
    fn deinitialize(&self) {}

    /// 成为默认实现后调用
    fn on_activate(&self) {}

    /// 不再是默认实现时调用
    fn on_deactivate(&self) {}

    /// 默认实现即将被替换（`None` 表示不再有默认实现）
    ///
    /// 在激活目录锁内同步调用，实现中不能再访问激活目录。
    fn on_changing_default(&self, _replacement: Option<&InterfaceRef>) {}

    /// 日志能力
    fn as_log_sink(&self) -> Option<&dyn LogSink> {
        None
    }

    /// 向下转型
    fn as_any(&self) -> &dyn Any;
}

/// 接口描述
pub struct InterfaceDescriptor {
    name: String,
    uuid: Uuid,
    module_name: String,
    module_uuid: Uuid,
    service: Arc<dyn Interface>,
    state: Mutex<InterfaceState>,
    queued: AtomicBool,
}

impl InterfaceDescriptor {
    pub(crate) fn new(service: Arc<dyn Interface>, owner: &Arc<dyn Module>) -> Self {
        Self {
            name: service.interface_name().to_string(),
            uuid: service.interface_uuid(),
            module_name: owner.name().to_string(),
            module_uuid: owner.uuid(),
            service,
            state: Mutex::new(InterfaceState::Registered),
            queued: AtomicBool::new(false),
        }
    }

    /// 接口名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 接口 UUID
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// 所属模块名称
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// 所属模块 UUID
    pub fn module_uuid(&self) -> Uuid {
        self.module_uuid
    }

    /// 服务实现
    pub fn service(&self) -> &Arc<dyn Interface> {
        &self.service
    }

    /// 向下转型为具体的服务类型
    pub fn downcast_ref<T: Interface>(&self) -> Option<&T> {
        self.service.as_any().downcast_ref::<T>()
    }

    /// 当前生命周期状态
    pub fn state(&self) -> InterfaceState {
        *self.state.lock()
    }

    /// 是否处于激活状态
    pub fn is_active(&self) -> bool {
        self.state() == InterfaceState::Active
    }

    /// 是否在待激活队列中
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    /// 是否包装了指定的服务实例
    pub fn wraps(&self, service: &Arc<dyn Interface>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.service) as *const (),
            Arc::as_ptr(service) as *const (),
        )
    }

    pub(crate) fn set_state(&self, state: InterfaceState) {
        *self.state.lock() = state;
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.queued.store(queued, Ordering::Release);
    }
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDescriptor")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("module", &self.module_name)
            .field("state", &self.state())
            .field("queued", &self.is_queued())
            .finish()
    }
}

/// 接口弱引用
///
/// 缓存身份信息，描述被注销后仍可用于日志和比较。
#[derive(Clone)]
pub struct InterfaceRef {
    name: String,
    uuid: Uuid,
    module_uuid: Uuid,
    inner: Weak<InterfaceDescriptor>,
}

impl InterfaceRef {
    /// 接口名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 接口 UUID
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// 所属模块 UUID
    pub fn module_uuid(&self) -> Uuid {
        self.module_uuid
    }

    /// 获取描述（已被注销时返回 `None`）
    pub fn upgrade(&self) -> Option<Arc<InterfaceDescriptor>> {
        self.inner.upgrade()
    }

    /// 描述是否仍然存在
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// 是否指向指定的描述
    pub fn points_to(&self, descriptor: &Arc<InterfaceDescriptor>) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(descriptor))
    }
}

impl From<&Arc<InterfaceDescriptor>> for InterfaceRef {
    fn from(descriptor: &Arc<InterfaceDescriptor>) -> Self {
        Self {
            name: descriptor.name.clone(),
            uuid: descriptor.uuid,
            module_uuid: descriptor.module_uuid,
            inner: Arc::downgrade(descriptor),
        }
    }
}

impl PartialEq for InterfaceRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl fmt::Debug for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceRef")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// 接口子注册表
///
/// 每个模块一份，按名称和 UUID 双键索引自己的接口。
#[derive(Debug)]
pub struct InterfaceRegistry {
    index: DualIndex<Arc<InterfaceDescriptor>>,
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceRegistry {
    /// 创建空的子注册表
    pub fn new() -> Self {
        Self {
            index: DualIndex::new("interfaces"),
        }
    }

    /// 加入描述，名称或 UUID 重复时返回冲突错误
    pub fn insert(&mut self, descriptor: Arc<InterfaceDescriptor>) -> Result<SlotId> {
        let name = descriptor.name.clone();
        let uuid = descriptor.uuid;
        self.index.insert(name, uuid, descriptor)
    }

    /// 按名称或 UUID 查找
    pub fn find(&self, key: &Key<'_>) -> Option<(SlotId, &Arc<InterfaceDescriptor>)> {
        let slot = self.index.lookup_checked(key)?;
        self.index.get(slot).map(|d| (slot, d))
    }

    /// 查找包装了指定服务实例的描述
    pub fn find_service(
        &self,
        service: &Arc<dyn Interface>,
    ) -> Option<(SlotId, &Arc<InterfaceDescriptor>)> {
        let slot = self
            .index
            .resolve(service.interface_name(), &service.interface_uuid())
            .slot()?;
        self.index
            .get(slot)
            .filter(|d| d.wraps(service))
            .map(|d| (slot, d))
    }

    /// 将槽位置为墓碑
    pub fn tombstone(&mut self, slot: SlotId) -> Option<Arc<InterfaceDescriptor>> {
        self.index.remove(slot)
    }

    /// 清空，按注册顺序返回所有描述
    pub fn drain(&mut self) -> Vec<Arc<InterfaceDescriptor>> {
        self.index.drain().into_iter().map(|(_, _, d)| d).collect()
    }

    /// 按注册顺序列出所有描述
    pub fn descriptors(&self) -> Vec<Arc<InterfaceDescriptor>> {
        self.index.iter().map(|(_, _, _, d)| Arc::clone(d)).collect()
    }

    /// 按注册顺序列出名称
    pub fn names(&self) -> Vec<String> {
        self.index.iter().map(|(_, name, _, _)| name.to_string()).collect()
    }

    /// 接口数量
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 索引快照
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        self.index.snapshot()
    }

    /// 校验双索引一致性
    pub fn check_consistency(&self) -> Result<()> {
        self.index.check_consistency()
    }
}

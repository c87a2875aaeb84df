//! 激活目录
//!
//! 进程内唯一的"接口身份 -> 当前默认实现"映射，名称和 UUID 两个键指向同一个槽位。
//! 目录只保存弱引用，接口被注销后对应的槽位会在下一次访问时清理。
//!
//! 状态切换的回调（`on_changing_default` / `on_deactivate` / `on_activate`）
//! 在目录锁内同步调用，回调中不能再访问激活目录。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::module::index::{DualIndex, IndexEntry, SlotId};
use crate::module::{InterfaceDescriptor, InterfaceRef, InterfaceState, Key};
use crate::utils::{HostError, Result};

/// 激活目录
#[derive(Debug)]
pub struct ActiveDirectory {
    entries: Mutex<DualIndex<InterfaceRef>>,
}

impl Default for ActiveDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveDirectory {
    /// 创建空目录
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(DualIndex::new("active")),
        }
    }

    /// 获取当前激活的接口
    pub fn get(&self, key: &Key<'_>) -> Result<Arc<InterfaceDescriptor>> {
        let entries = self.entries.lock();
        entries
            .lookup_checked(key)
            .and_then(|slot| entries.get(slot))
            .and_then(InterfaceRef::upgrade)
            .ok_or_else(|| HostError::NotActive(key.to_string()))
    }

    /// 按名称或 UUID 停用
    ///
    /// 键不存在时返回 `NotActive`；槽位中的接口已被注销时只清理槽位。
    pub fn deactivate(&self, key: &Key<'_>) -> Result<()> {
        let mut entries = self.entries.lock();
        let slot = entries
            .lookup_checked(key)
            .ok_or_else(|| HostError::NotActive(key.to_string()))?;
        Self::stop_slot(&mut entries, slot);
        Ok(())
    }

    /// 如果指定接口正处于激活状态则停用它
    pub fn deactivate_descriptor(&self, descriptor: &Arc<InterfaceDescriptor>) -> bool {
        let mut entries = self.entries.lock();
        let slot = entries
            .resolve(descriptor.name(), &descriptor.uuid())
            .slot()
            .filter(|slot| {
                entries
                    .get(*slot)
                    .map(|r| r.points_to(descriptor))
                    .unwrap_or(false)
            });
        match slot {
            Some(slot) => {
                Self::stop_slot(&mut entries, slot);
                true
            }
            None => false,
        }
    }

    fn stop_slot(entries: &mut DualIndex<InterfaceRef>, slot: SlotId) {
        let Some(reference) = entries.remove(slot) else {
            return;
        };
        match reference.upgrade() {
            Some(descriptor) => {
                let service = descriptor.service();
                service.on_changing_default(None);
                service.on_deactivate();
                descriptor.set_state(InterfaceState::Initialized);
                info!(
                    interface = %descriptor.name(),
                    uuid = %descriptor.uuid(),
                    "接口已停用"
                );
            }
            None => {
                debug!(interface = %reference.name(), "接口已注销，清理激活槽位");
            }
        }
    }

    /// 把接口提升为默认实现
    ///
    /// 名称或 UUID 相同的旧实现都会被替换，替换前收到 `on_changing_default(Some(new))`
    /// 和 `on_deactivate`。返回被替换的旧实现。
    pub fn promote(&self, descriptor: &Arc<InterfaceDescriptor>) -> Vec<InterfaceRef> {
        let mut entries = self.entries.lock();
        let name_slot = entries.get_by_name(descriptor.name()).map(|(s, _)| s);
        let uuid_slot = entries.get_by_uuid(&descriptor.uuid()).map(|(s, _)| s);

        if let (Some(n), Some(u)) = (name_slot, uuid_slot) {
            if n == u
                && entries
                    .get(n)
                    .map(|r| r.points_to(descriptor))
                    .unwrap_or(false)
            {
                debug!(interface = %descriptor.name(), "接口已是默认实现");
                return Vec::new();
            }
        }

        let replacement = InterfaceRef::from(descriptor);
        let mut slots: Vec<SlotId> = name_slot.into_iter().chain(uuid_slot).collect();
        slots.dedup();

        let mut displaced = Vec::new();
        for slot in slots {
            let Some(old) = entries.remove(slot) else {
                continue;
            };
            if let Some(previous) = old.upgrade() {
                let service = previous.service();
                service.on_changing_default(Some(&replacement));
                service.on_deactivate();
                previous.set_state(InterfaceState::Initialized);
                info!(
                    interface = %previous.name(),
                    module = %previous.module_name(),
                    replacement_module = %descriptor.module_name(),
                    "默认实现被替换"
                );
            }
            displaced.push(old);
        }

        if let Err(e) = entries.insert(descriptor.name(), descriptor.uuid(), replacement) {
            warn!(interface = %descriptor.name(), error = %e, "写入激活目录失败");
            return displaced;
        }

        descriptor.set_state(InterfaceState::Active);
        descriptor.service().on_activate();
        info!(
            interface = %descriptor.name(),
            uuid = %descriptor.uuid(),
            module = %descriptor.module_name(),
            "接口已激活"
        );
        displaced
    }

    /// 停用所有接口，按槽位顺序
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let slots: Vec<SlotId> = entries.iter().map(|(slot, _, _, _)| slot).collect();
        for slot in &slots {
            Self::stop_slot(&mut entries, *slot);
        }
        slots.len()
    }

    /// 激活的接口数量（包括尚未清理的失效槽位）
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 目录快照
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        self.entries.lock().snapshot()
    }

    /// 校验双索引一致性
    pub fn check_consistency(&self) -> Result<()> {
        self.entries.lock().check_consistency()
    }
}

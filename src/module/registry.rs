//! 模块注册表
//!
//! 以名称和 UUID 双键索引已加载的模块。每个条目独占持有模块实例、
//! 接口子注册表以及（动态库模块的）库句柄。

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use libloading::Library;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::index::{DualIndex, IndexEntry, Resolution, SlotId};
use super::interface::InterfaceRegistry;
use super::loader::LoadedModule;
use super::metadata::{Key, ModuleHandle, ModuleInfo, ModuleState};
use super::protocol::Module;
use crate::utils::{id, HostError, Result};

/// 已注册的模块
pub struct ModuleEntry {
    /// 模块实例
    pub module: Arc<dyn Module>,

    /// 生命周期状态
    pub state: ModuleState,

    /// 接口子注册表
    pub interfaces: InterfaceRegistry,

    /// 加载路径（内置模块为空）
    pub path: Option<PathBuf>,

    /// 注册时间
    pub registered_at: DateTime<Utc>,

    /// 动态库句柄
    pub(crate) library: Option<Library>,
}

impl ModuleEntry {
    /// 生成运行时信息
    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.module.name().to_string(),
            uuid: self.module.uuid(),
            state: self.state,
            path: self.path.clone(),
            interfaces: self.interfaces.names(),
            registered_at: self.registered_at,
        }
    }
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.module.name())
            .field("uuid", &self.module.uuid())
            .field("state", &self.state)
            .field("interfaces", &self.interfaces.len())
            .field("path", &self.path)
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

/// 注册表快照
///
/// 模块层和每个模块的接口层索引，可直接比较相等。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// 模块索引
    pub modules: Vec<IndexEntry>,
    /// 每个模块的接口索引（与 `modules` 同序）
    pub interfaces: Vec<(Uuid, Vec<IndexEntry>)>,
}

/// 模块注册表
pub struct ModuleRegistry {
    index: DualIndex<ModuleEntry>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            index: DualIndex::new("modules"),
        }
    }

    /// 插入已完成握手的模块
    ///
    /// 先检查 UUID 再检查名称，冲突时注册表保持不变。
    pub fn insert(&mut self, loaded: LoadedModule, path: Option<PathBuf>) -> Result<ModuleHandle> {
        let name = loaded.module.name().to_string();
        let uuid = loaded.module.uuid();

        // 身份无效时整体丢弃 `loaded`，模块先于动态库释放
        if !id::is_valid_name(&name) || uuid.is_nil() {
            return Err(HostError::NullDescriptor(format!(
                "模块身份无效: name='{}', uuid={}",
                name, uuid
            )));
        }

        let LoadedModule { module, library } = loaded;
        let entry = ModuleEntry {
            module,
            state: ModuleState::Loaded,
            interfaces: InterfaceRegistry::new(),
            path,
            registered_at: Utc::now(),
            library,
        };

        match self.index.insert(name.clone(), uuid, entry) {
            Ok(slot) => {
                info!(module = %name, uuid = %uuid, slot = %slot, "模块已注册");
                Ok(ModuleHandle::new(name, uuid, slot))
            }
            Err(e) => {
                warn!(module = %name, uuid = %uuid, error = %e, "模块注册冲突");
                Err(e)
            }
        }
    }

    /// 按名称或 UUID 查找
    pub fn get(&self, key: &Key<'_>) -> Result<(SlotId, &ModuleEntry)> {
        self.index
            .lookup_checked(key)
            .and_then(|slot| self.index.get(slot).map(|e| (slot, e)))
            .ok_or_else(|| HostError::NotFound(format!("模块 {}", key)))
    }

    /// 按槽位获取
    pub fn get_slot(&self, slot: SlotId) -> Option<&ModuleEntry> {
        self.index.get(slot)
    }

    /// 按槽位获取可变条目
    pub fn get_slot_mut(&mut self, slot: SlotId) -> Option<&mut ModuleEntry> {
        self.index.get_mut(slot)
    }

    /// 按 UUID 获取可变条目
    pub fn get_by_uuid_mut(&mut self, uuid: &Uuid) -> Option<(SlotId, &mut ModuleEntry)> {
        let slot = self.index.get_by_uuid(uuid).map(|(slot, _)| slot)?;
        self.index.get_mut(slot).map(|e| (slot, e))
    }

    /// 解析句柄对应的槽位
    ///
    /// 两个索引不一致时降级处理；都找不到时返回 `NotFound`。
    /// 句柄记录的槽位已被复用（同名模块重新注册）时同样返回 `NotFound`。
    pub fn resolve_handle(&self, handle: &ModuleHandle) -> Result<SlotId> {
        let slot = match self.index.resolve(handle.name(), &handle.uuid()) {
            Resolution::Agreed(slot) => slot,
            Resolution::Degraded(slot) => {
                warn!(module = %handle, slot = %slot, "模块句柄解析降级");
                slot
            }
            Resolution::Missing => {
                return Err(HostError::NotFound(format!("模块 {}", handle)));
            }
        };
        match handle.slot() {
            Some(expected) if expected != slot => Err(HostError::NotFound(format!(
                "模块 {} (句柄已失效)",
                handle
            ))),
            _ => Ok(slot),
        }
    }

    /// 设置模块状态
    pub fn set_state(&mut self, slot: SlotId, state: ModuleState) -> Result<()> {
        let entry = self
            .index
            .get_mut(slot)
            .ok_or_else(|| HostError::NotFound(format!("模块槽位 {}", slot)))?;
        debug!(module = %entry.module.name(), from = %entry.state, to = %state, "模块状态变化");
        entry.state = state;
        Ok(())
    }

    /// 移除模块
    pub fn remove(&mut self, slot: SlotId) -> Option<ModuleEntry> {
        self.index.remove(slot)
    }

    /// 清空，按注册顺序返回
    pub fn drain(&mut self) -> Vec<ModuleEntry> {
        self.index.drain().into_iter().map(|(_, _, e)| e).collect()
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ModuleEntry)> + '_ {
        self.index.iter().map(|(slot, _, _, entry)| (slot, entry))
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 生成快照
    pub fn snapshot(&self) -> RegistrySnapshot {
        let modules = self.index.snapshot();
        let interfaces = modules
            .iter()
            .filter_map(|m| {
                self.index
                    .get(m.slot)
                    .map(|e| (m.uuid, e.interfaces.snapshot()))
            })
            .collect();
        RegistrySnapshot {
            modules,
            interfaces,
        }
    }

    /// 校验模块层和所有接口层的双索引一致性
    pub fn check_consistency(&self) -> Result<()> {
        self.index.check_consistency()?;
        for (_, entry) in self.iter() {
            entry.interfaces.check_consistency()?;
        }
        Ok(())
    }
}

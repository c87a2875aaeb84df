//! 双键索引
//!
//! 模块注册表、接口子注册表和激活目录都需要同时按名称和按 UUID 查找。
//! `DualIndex` 把条目放在一个带代数（generation）的槽位数组里，两张查找表
//! 只保存槽位 ID，而不各自持有数据，因此"两个索引必须一致"是结构保证的。
//!
//! 移除条目时只把槽位置为墓碑（清空内容并递增代数），不压缩数组，
//! 其他条目的槽位下标保持不变；持有旧槽位 ID 的调用方会因代数不匹配而查找失败。

use std::collections::HashMap;
use std::fmt;

use tracing::warn;
use uuid::Uuid;

use crate::module::metadata::Key;
use crate::utils::{HostError, Result};

/// 槽位 ID
///
/// 由数组下标和代数组成。槽位被移除后代数递增，旧 ID 随即失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// 槽位下标
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// 槽位代数
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// 槽位中的条目
#[derive(Debug)]
struct Entry<T> {
    name: String,
    uuid: Uuid,
    seq: u64,
    value: T,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// 索引快照条目
///
/// 用于比较注册表在操作前后是否发生变化。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    /// 名称
    pub name: String,
    /// UUID
    pub uuid: Uuid,
    /// 槽位
    pub slot: SlotId,
}

/// 双键解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 两个索引指向同一个有效槽位
    Agreed(SlotId),
    /// 两个索引不一致，按策略选出的槽位
    Degraded(SlotId),
    /// 两个索引都没有有效槽位
    Missing,
}

impl Resolution {
    /// 获取解析出的槽位
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Resolution::Agreed(slot) | Resolution::Degraded(slot) => Some(*slot),
            Resolution::Missing => None,
        }
    }
}

/// 名称 + UUID 双键索引
pub struct DualIndex<T> {
    /// 索引用途（仅用于日志）
    label: &'static str,

    /// 槽位数组
    slots: Vec<Slot<T>>,

    /// 可复用的墓碑槽位
    free: Vec<u32>,

    /// 名称 -> 槽位
    by_name: HashMap<String, SlotId>,

    /// UUID -> 槽位
    by_uuid: HashMap<Uuid, SlotId>,

    /// 下一个插入序号
    next_seq: u64,
}

impl<T> DualIndex<T> {
    /// 创建空索引
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: Vec::new(),
            free: Vec::new(),
            by_name: HashMap::new(),
            by_uuid: HashMap::new(),
            next_seq: 0,
        }
    }

    /// 插入条目
    ///
    /// 先检查 UUID 再检查名称，任一冲突都不会修改索引。
    pub fn insert(&mut self, name: impl Into<String>, uuid: Uuid, value: T) -> Result<SlotId> {
        let name = name.into();

        if self.live_slot_for_uuid(&uuid).is_some() {
            return Err(HostError::DuplicateUuid(uuid));
        }
        if self.live_slot_for_name(&name).is_some() {
            return Err(HostError::DuplicateName(name));
        }

        let entry = Entry {
            name: name.clone(),
            uuid,
            seq: self.next_seq,
            value,
        };
        self.next_seq += 1;

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.entry = Some(entry);
                SlotId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                SlotId {
                    index,
                    generation: 0,
                }
            }
        };

        self.by_name.insert(name, id);
        self.by_uuid.insert(uuid, id);
        Ok(id)
    }

    /// 按槽位 ID 获取条目
    ///
    /// 下标越界或代数不匹配时返回 `None`。
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.entry(id).map(|e| &e.value)
    }

    /// 按槽位 ID 获取可变条目
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut().map(|e| &mut e.value)
    }

    /// 按名称查找
    pub fn get_by_name(&self, name: &str) -> Option<(SlotId, &T)> {
        let id = self.live_slot_for_name(name)?;
        self.get(id).map(|v| (id, v))
    }

    /// 按 UUID 查找
    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<(SlotId, &T)> {
        let id = self.live_slot_for_uuid(uuid)?;
        self.get(id).map(|v| (id, v))
    }

    /// 按名称或 UUID 查找
    pub fn lookup(&self, key: &Key<'_>) -> Option<(SlotId, &T)> {
        match key {
            Key::Name(name) => self.get_by_name(name),
            Key::Uuid(uuid) => self.get_by_uuid(uuid),
        }
    }

    /// 按名称或 UUID 查找，并用条目的另一个键交叉校验
    ///
    /// 交叉校验失败时按 [`DualIndex::resolve`] 的策略降级。
    pub fn lookup_checked(&self, key: &Key<'_>) -> Option<SlotId> {
        let (id, _) = self.lookup(key)?;
        let (name, uuid) = self.keys(id)?;
        self.resolve(name, &uuid).slot()
    }

    /// 槽位中条目的名称和 UUID
    pub fn keys(&self, id: SlotId) -> Option<(&str, Uuid)> {
        self.entry(id).map(|e| (e.name.as_str(), e.uuid))
    }

    /// 名称索引中记录的槽位（不检查有效性）
    pub fn name_slot(&self, name: &str) -> Option<SlotId> {
        self.by_name.get(name).copied()
    }

    /// UUID 索引中记录的槽位（不检查有效性）
    pub fn uuid_slot(&self, uuid: &Uuid) -> Option<SlotId> {
        self.by_uuid.get(uuid).copied()
    }

    /// 同时按名称和 UUID 解析槽位
    ///
    /// 两个索引不一致时记录告警并降级继续：UUID 索引指向有效槽位时以它为准，
    /// 否则使用名称索引指向的有效槽位。
    pub fn resolve(&self, name: &str, uuid: &Uuid) -> Resolution {
        let by_name = self.name_slot(name).filter(|id| self.entry(*id).is_some());
        let by_uuid = self.uuid_slot(uuid).filter(|id| self.entry(*id).is_some());

        match (by_name, by_uuid) {
            (Some(n), Some(u)) if n == u => Resolution::Agreed(u),
            (None, None) => Resolution::Missing,
            (n, u) => {
                warn!(
                    index = self.label,
                    name = %name,
                    uuid = %uuid,
                    name_slot = ?n,
                    uuid_slot = ?u,
                    "名称索引与 UUID 索引指向不同的槽位，降级处理"
                );
                match u.or(n) {
                    Some(id) => Resolution::Degraded(id),
                    None => Resolution::Missing,
                }
            }
        }
    }

    /// 移除槽位中的条目
    ///
    /// 槽位被置为墓碑，两张索引中指向该槽位的键同时移除。
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if self.by_name.get(&entry.name) == Some(&id) {
            self.by_name.remove(&entry.name);
        }
        if self.by_uuid.get(&entry.uuid) == Some(&id) {
            self.by_uuid.remove(&entry.uuid);
        }
        // 降级路径下可能还有其他键指向该槽位
        self.by_name.retain(|_, slot| *slot != id);
        self.by_uuid.retain(|_, slot| *slot != id);

        Some(entry.value)
    }

    /// 清空所有条目，按插入顺序返回
    pub fn drain(&mut self) -> Vec<(String, Uuid, T)> {
        let mut drained = Vec::new();
        for slot in self.slots.iter_mut() {
            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                drained.push(entry);
            }
        }
        drained.sort_by_key(|e| e.seq);
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.by_name.clear();
        self.by_uuid.clear();
        drained
            .into_iter()
            .map(|e| (e.name, e.uuid, e.value))
            .collect()
    }

    /// 有效条目数量
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 槽位总数（包括墓碑）
    pub fn capacity_slots(&self) -> usize {
        self.slots.len()
    }

    /// 两张索引各自的键数量 `(名称, UUID)`
    pub fn index_sizes(&self) -> (usize, usize) {
        (self.by_name.len(), self.by_uuid.len())
    }

    /// 按插入顺序遍历有效条目
    ///
    /// 墓碑槽位会被复用，槽位顺序不等于插入顺序。
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &str, Uuid, &T)> + '_ {
        let mut live: Vec<(u64, SlotId, &Entry<T>)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.entry.as_ref().map(|e| {
                    let id = SlotId {
                        index: index as u32,
                        generation: slot.generation,
                    };
                    (e.seq, id, e)
                })
            })
            .collect();
        live.sort_by_key(|(seq, _, _)| *seq);
        live.into_iter()
            .map(|(_, id, e)| (id, e.name.as_str(), e.uuid, &e.value))
    }

    /// 生成快照（按名称排序）
    pub fn snapshot(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self
            .iter()
            .map(|(slot, name, uuid, _)| IndexEntry {
                name: name.to_string(),
                uuid,
                slot,
            })
            .collect();
        entries.sort();
        entries
    }

    /// 校验两张索引是否一致
    ///
    /// 要求两张索引的键数量与有效条目数量相同，且每个条目的名称和 UUID
    /// 都指向它自己的槽位。
    pub fn check_consistency(&self) -> Result<()> {
        let live = self.len();
        let (names, uuids) = self.index_sizes();
        if names != live || uuids != live {
            return Err(HostError::Inconsistent(format!(
                "{} 索引数量不一致: 条目 {}, 名称键 {}, UUID 键 {}",
                self.label, live, names, uuids
            )));
        }
        for (id, name, uuid, _) in self.iter() {
            if self.by_name.get(name) != Some(&id) || self.by_uuid.get(&uuid) != Some(&id) {
                return Err(HostError::Inconsistent(format!(
                    "{} 条目 '{}' ({}) 的索引未指向槽位 {}",
                    self.label, name, uuid, id
                )));
            }
        }
        Ok(())
    }

    fn entry(&self, id: SlotId) -> Option<&Entry<T>> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn live_slot_for_name(&self, name: &str) -> Option<SlotId> {
        self.name_slot(name).filter(|id| self.entry(*id).is_some())
    }

    fn live_slot_for_uuid(&self, uuid: &Uuid) -> Option<SlotId> {
        self.uuid_slot(uuid).filter(|id| self.entry(*id).is_some())
    }

    #[cfg(test)]
    pub(crate) fn rebind_name(&mut self, name: &str, id: SlotId) {
        self.by_name.insert(name.to_string(), id);
    }
}

impl<T> fmt::Debug for DualIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualIndex")
            .field("label", &self.label)
            .field("entries", &self.snapshot())
            .field("tombstones", &self.free.len())
            .finish()
    }
}

//! 模块与接口的元数据定义
//!
//! 生命周期状态、模块句柄、查找键和日志级别。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::index::SlotId;

/// 模块生命周期状态
///
/// 注册成功后为 `Loaded`，依次经过三个初始化阶段；
/// 注销时先进入 `Deinitializing`（级联拆除接口），最后为 `Unloaded`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// 已加载（库已初始化）
    #[default]
    Loaded,
    /// 管理器已初始化
    ManagersInitialized,
    /// 属性已初始化
    PropertiesInitialized,
    /// 反射已初始化
    ReflectionInitialized,
    /// 正在反初始化
    Deinitializing,
    /// 已卸载
    Unloaded,
}

impl ModuleState {
    /// 初始化序列中的下一个状态
    pub fn next_init(&self) -> Option<ModuleState> {
        match self {
            ModuleState::Loaded => Some(ModuleState::ManagersInitialized),
            ModuleState::ManagersInitialized => Some(ModuleState::PropertiesInitialized),
            ModuleState::PropertiesInitialized => Some(ModuleState::ReflectionInitialized),
            _ => None,
        }
    }

    /// 是否已完成全部初始化阶段
    pub fn is_fully_initialized(&self) -> bool {
        *self == ModuleState::ReflectionInitialized
    }

    /// 是否可以开始反初始化
    pub fn can_deinitialize(&self) -> bool {
        !matches!(self, ModuleState::Deinitializing | ModuleState::Unloaded)
    }

    /// 是否已经达到（或越过）指定的初始化阶段
    pub fn reached(&self, stage: ModuleState) -> bool {
        self.can_deinitialize() && *self >= stage
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Loaded => "loaded",
            ModuleState::ManagersInitialized => "managers_initialized",
            ModuleState::PropertiesInitialized => "properties_initialized",
            ModuleState::ReflectionInitialized => "reflection_initialized",
            ModuleState::Deinitializing => "deinitializing",
            ModuleState::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}

/// 接口生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceState {
    /// 已加入子注册表
    Registered,
    /// 已初始化
    Initialized,
    /// 当前处于激活状态
    Active,
    /// 已反初始化
    Deinitialized,
}

impl InterfaceState {
    /// 是否需要在拆除时调用 `deinitialize`
    pub fn needs_deinitialize(&self) -> bool {
        matches!(self, InterfaceState::Initialized | InterfaceState::Active)
    }

    /// 是否还可以请求激活
    pub fn can_activate(&self) -> bool {
        !matches!(self, InterfaceState::Deinitialized)
    }
}

impl fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceState::Registered => "registered",
            InterfaceState::Initialized => "initialized",
            InterfaceState::Active => "active",
            InterfaceState::Deinitialized => "deinitialized",
        };
        f.write_str(s)
    }
}

/// 模块日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 详细
    Verbose,
    /// 信息
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
    /// 严重
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// 查找键：名称或 UUID
///
/// ```
/// use chips_host::module::Key;
/// use uuid::Uuid;
///
/// let by_name: Key = "LogManager".into();
/// let by_uuid: Key = Uuid::nil().into();
/// assert!(by_name.is_valid());
/// assert!(!by_uuid.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key<'a> {
    /// 按名称查找
    Name(&'a str),
    /// 按 UUID 查找
    Uuid(Uuid),
}

impl Key<'_> {
    /// 空名称和 nil UUID 都视为无效键
    pub fn is_valid(&self) -> bool {
        match self {
            Key::Name(name) => !name.trim().is_empty(),
            Key::Uuid(uuid) => !uuid.is_nil(),
        }
    }
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Key::Name(name)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(name: &'a String) -> Self {
        Key::Name(name.as_str())
    }
}

impl From<Uuid> for Key<'_> {
    fn from(uuid: Uuid) -> Self {
        Key::Uuid(uuid)
    }
}

impl From<&Uuid> for Key<'_> {
    fn from(uuid: &Uuid) -> Self {
        Key::Uuid(*uuid)
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "'{}'", name),
            Key::Uuid(uuid) => write!(f, "{{{}}}", uuid),
        }
    }
}

/// 模块句柄
///
/// `register_module` 的返回值，只记录身份，不持有模块本身。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    name: String,
    uuid: Uuid,
    slot: Option<SlotId>,
}

impl ModuleHandle {
    pub(crate) fn new(name: impl Into<String>, uuid: Uuid, slot: SlotId) -> Self {
        Self {
            name: name.into(),
            uuid,
            slot: Some(slot),
        }
    }

    /// 仅凭身份构造句柄（例如从配置或日志中恢复）
    pub fn from_identity(name: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            name: name.into(),
            uuid,
            slot: None,
        }
    }

    /// 模块名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 模块 UUID
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// 注册时分配的槽位
    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// 名称和 UUID 都为空的句柄视为无效
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty() && self.uuid.is_nil()
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}}}", self.name, self.uuid)
    }
}

/// 模块运行时信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// 模块名称
    pub name: String,

    /// 模块 UUID
    pub uuid: Uuid,

    /// 当前状态
    pub state: ModuleState,

    /// 加载路径（内置模块为空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// 已注册的接口名称（按槽位顺序）
    pub interfaces: Vec<String>,

    /// 注册时间
    pub registered_at: DateTime<Utc>,
}

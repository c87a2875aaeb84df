//! 薯片模块宿主错误类型定义
//!
//! 本模块定义了宿主中使用的所有错误类型。所有公开操作都返回 [`Result`]，
//! 任何失败都不会以 panic 的形式越过模块边界。

use thiserror::Error;
use uuid::Uuid;

/// 错误分类
///
/// 与具体错误变体正交，用于调用方按类别处理错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 参数为空或格式错误
    Validation,
    /// 名称/UUID 未知，或从未注册、未激活
    NotFound,
    /// 注册时名称或 UUID 重复
    Conflict,
    /// 双索引不一致
    Consistency,
    /// 当前生命周期阶段不允许该操作
    State,
    /// 加载器、IO、配置等外部失败
    External,
}

/// 宿主核心错误类型
#[derive(Error, Debug)]
pub enum HostError {
    // ==================== 参数校验错误 ====================

    /// 空参数
    #[error("参数为空: {0}")]
    NullArgument(String),

    /// 空接口
    #[error("接口为空或无效: {0}")]
    NullInterface(String),

    /// 接口没有声明所属模块
    #[error("接口 '{0}' 没有声明所属模块")]
    NoOwningModule(String),

    /// 接口声明的所属模块未注册
    #[error("接口 '{interface}' 的所属模块 '{module}' 未注册")]
    ModuleNotRegistered {
        /// 接口名称
        interface: String,
        /// 声明的模块名称
        module: String,
    },

    /// 接口声明的所属模块与注册表中的实例不一致
    #[error("接口 '{interface}' 声明的模块 {module_uuid} 与已注册的模块实例不一致")]
    ModuleMismatch {
        /// 接口名称
        interface: String,
        /// 声明的模块 UUID
        module_uuid: Uuid,
    },

    // ==================== 模块加载错误 ====================

    /// 模块无法打开
    #[error("模块加载失败: '{path}' - {reason}")]
    LoadFailed {
        /// 模块路径
        path: String,
        /// 失败原因
        reason: String,
    },

    /// 模块未导出约定的入口符号
    #[error("模块 '{path}' 不符合模块协议: 缺少入口符号 '{symbol}'")]
    ProtocolMismatch {
        /// 模块路径
        path: String,
        /// 缺少的入口符号
        symbol: String,
    },

    /// 入口函数没有返回模块描述
    #[error("模块 '{0}' 的入口函数返回了空的模块描述")]
    NullDescriptor(String),

    // ==================== 冲突错误 ====================

    /// 名称重复
    #[error("名称已注册: '{0}'")]
    DuplicateName(String),

    /// UUID 重复
    #[error("UUID 已注册: {0}")]
    DuplicateUuid(Uuid),

    // ==================== 查找错误 ====================

    /// 未找到
    #[error("未找到: {0}")]
    NotFound(String),

    /// 未激活
    #[error("没有处于激活状态的接口: {0}")]
    NotActive(String),

    // ==================== 状态错误 ====================

    /// 当前状态不允许该操作
    #[error("状态无效: {0}")]
    InvalidState(String),

    /// 在事件回调中重入触发同一事件
    #[error("事件 '{0}' 正在当前线程分发中，禁止重入触发")]
    ReentrantTrigger(String),

    /// 双索引不一致且无法恢复
    #[error("索引不一致: {0}")]
    Inconsistent(String),

    // ==================== 外部错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 宿主操作结果类型别名
pub type Result<T> = std::result::Result<T, HostError>;

/// 错误码常量
pub mod error_code {
    // 参数错误 (ARG-xxx)
    /// 空参数
    pub const NULL_ARGUMENT: &str = "ARG-001";
    /// 空接口
    pub const NULL_INTERFACE: &str = "ARG-002";
    /// 接口没有所属模块
    pub const NO_OWNING_MODULE: &str = "ARG-003";
    /// 所属模块实例不一致
    pub const MODULE_MISMATCH: &str = "ARG-004";

    // 模块错误 (MODULE-xxx)
    /// 所属模块未注册
    pub const MODULE_NOT_REGISTERED: &str = "MODULE-001";
    /// 模块加载失败
    pub const MODULE_LOAD_FAILED: &str = "MODULE-002";
    /// 缺少入口符号
    pub const MODULE_PROTOCOL_MISMATCH: &str = "MODULE-003";
    /// 空的模块描述
    pub const MODULE_NULL_DESCRIPTOR: &str = "MODULE-004";
    /// 初始化失败
    pub const MODULE_INIT_FAILED: &str = "MODULE-005";

    // 注册表错误 (REGISTRY-xxx)
    /// 名称重复
    pub const DUPLICATE_NAME: &str = "REGISTRY-001";
    /// UUID 重复
    pub const DUPLICATE_UUID: &str = "REGISTRY-002";
    /// 未找到
    pub const NOT_FOUND: &str = "REGISTRY-003";
    /// 双索引不一致
    pub const INCONSISTENT_INDEX: &str = "REGISTRY-004";

    // 激活错误 (ACTIVATION-xxx)
    /// 未激活
    pub const NOT_ACTIVE: &str = "ACTIVATION-001";
    /// 状态无效
    pub const INVALID_STATE: &str = "ACTIVATION-002";

    // 事件错误 (EVENT-xxx)
    /// 重入触发
    pub const REENTRANT_TRIGGER: &str = "EVENT-001";

    // 配置错误 (CONFIG-xxx)
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
}

impl HostError {
    /// 获取错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            HostError::NullArgument(_)
            | HostError::NullInterface(_)
            | HostError::NoOwningModule(_)
            | HostError::ModuleNotRegistered { .. }
            | HostError::ModuleMismatch { .. } => ErrorKind::Validation,
            HostError::NotFound(_) | HostError::NotActive(_) => ErrorKind::NotFound,
            HostError::DuplicateName(_) | HostError::DuplicateUuid(_) => ErrorKind::Conflict,
            HostError::Inconsistent(_) => ErrorKind::Consistency,
            HostError::InvalidState(_) | HostError::ReentrantTrigger(_) => ErrorKind::State,
            _ => ErrorKind::External,
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            HostError::NullArgument(_) => error_code::NULL_ARGUMENT,
            HostError::NullInterface(_) => error_code::NULL_INTERFACE,
            HostError::NoOwningModule(_) => error_code::NO_OWNING_MODULE,
            HostError::ModuleMismatch { .. } => error_code::MODULE_MISMATCH,
            HostError::ModuleNotRegistered { .. } => error_code::MODULE_NOT_REGISTERED,
            HostError::LoadFailed { .. } => error_code::MODULE_LOAD_FAILED,
            HostError::ProtocolMismatch { .. } => error_code::MODULE_PROTOCOL_MISMATCH,
            HostError::NullDescriptor(_) => error_code::MODULE_NULL_DESCRIPTOR,
            HostError::InitFailed(_) => error_code::MODULE_INIT_FAILED,
            HostError::DuplicateName(_) => error_code::DUPLICATE_NAME,
            HostError::DuplicateUuid(_) => error_code::DUPLICATE_UUID,
            HostError::NotFound(_) => error_code::NOT_FOUND,
            HostError::Inconsistent(_) => error_code::INCONSISTENT_INDEX,
            HostError::NotActive(_) => error_code::NOT_ACTIVE,
            HostError::InvalidState(_) => error_code::INVALID_STATE,
            HostError::ReentrantTrigger(_) => error_code::REENTRANT_TRIGGER,
            HostError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            _ => "UNKNOWN",
        }
    }

    /// 是否为"未找到"类错误
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// 是否为冲突类错误
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_unique() {
        let codes = [
            error_code::NULL_ARGUMENT,
            error_code::NULL_INTERFACE,
            error_code::NO_OWNING_MODULE,
            error_code::MODULE_MISMATCH,
            error_code::MODULE_NOT_REGISTERED,
            error_code::MODULE_LOAD_FAILED,
            error_code::MODULE_PROTOCOL_MISMATCH,
            error_code::MODULE_NULL_DESCRIPTOR,
            error_code::MODULE_INIT_FAILED,
            error_code::DUPLICATE_NAME,
            error_code::DUPLICATE_UUID,
            error_code::NOT_FOUND,
            error_code::INCONSISTENT_INDEX,
            error_code::NOT_ACTIVE,
            error_code::INVALID_STATE,
            error_code::REENTRANT_TRIGGER,
            error_code::CONFIG_LOAD_FAILED,
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
        for code in codes {
            let (prefix, number) = code.split_once('-').unwrap();
            assert!(prefix.chars().all(|c| c.is_ascii_uppercase()));
            assert_eq!(number.len(), 3);
        }
    }

    #[test]
    fn test_error_display() {
        let err = HostError::NotFound("模块 'Core'".to_string());
        assert!(err.to_string().contains("Core"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(HostError::DuplicateUuid(Uuid::nil()).kind(), ErrorKind::Conflict);
        assert_eq!(HostError::DuplicateName("a".into()).kind(), ErrorKind::Conflict);
        assert_eq!(HostError::NotActive("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(HostError::NullInterface("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(HostError::ReentrantTrigger("x".into()).kind(), ErrorKind::State);
        assert_eq!(HostError::Inconsistent("x".into()).kind(), ErrorKind::Consistency);
        assert_eq!(
            HostError::NullDescriptor("lib.so".into()).kind(),
            ErrorKind::External
        );
    }

    #[test]
    fn test_error_code() {
        let err = HostError::ProtocolMismatch {
            path: "a.so".into(),
            symbol: "_chips_module".into(),
        };
        assert_eq!(err.error_code(), error_code::MODULE_PROTOCOL_MISMATCH);
        assert!(err.to_string().contains("_chips_module"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HostError = io_err.into();
        assert!(matches!(err, HostError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::External);
    }
}

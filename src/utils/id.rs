//! 标识工具
//!
//! 模块与接口都由"名称 + UUID"双重标识。本模块提供 UUID 生成、解析，
//! 以及名称合法性校验。

use uuid::Uuid;

/// 名称最大长度
const MAX_NAME_LENGTH: usize = 128;

/// 生成随机 UUID（v4）
///
/// # Example
///
/// ```
/// use chips_host::utils::id::generate_uuid;
///
/// let id = generate_uuid();
/// assert!(!id.is_nil());
/// ```
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// 从字符串解析 UUID
///
/// 接受带连字符的标准格式和 32 位十六进制简写格式。
///
/// # Example
///
/// ```
/// use chips_host::utils::id::parse_uuid;
///
/// assert!(parse_uuid("dac703fc-16bd-4f59-b62d-28ed3c9de087").is_some());
/// assert!(parse_uuid("not-a-uuid").is_none());
/// ```
pub fn parse_uuid(text: &str) -> Option<Uuid> {
    Uuid::parse_str(text.trim()).ok()
}

/// 由四个 32 位字组成 UUID
///
/// 便于在模块中以常量形式声明标识。
pub const fn uuid_from_words(a: u32, b: u32, c: u32, d: u32) -> Uuid {
    let value = ((a as u128) << 96) | ((b as u128) << 64) | ((c as u128) << 32) | (d as u128);
    Uuid::from_u128(value)
}

/// 校验名称是否合法
///
/// 名称不能为空、不能超过 128 字节，也不能包含控制字符。
pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && !name.chars().any(|c| c.is_control())
}

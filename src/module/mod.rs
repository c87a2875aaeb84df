//! 模块管理
//!
//! 包括模块协议、接口协议、双键索引、模块注册表、接口子注册表、加载器和生命周期驱动。

pub mod index;
pub mod interface;
pub mod lifecycle;
pub mod loader;
pub mod metadata;
pub mod protocol;
pub mod registry;

pub use index::{DualIndex, IndexEntry, Resolution, SlotId};
pub use interface::{Interface, InterfaceDescriptor, InterfaceRef, InterfaceRegistry};
pub use loader::{DylibLoader, LoadedModule, ModuleLoader, StaticLoader, MODULE_ENTRY_SYMBOL};
pub use metadata::{InterfaceState, Key, LogLevel, ModuleHandle, ModuleInfo, ModuleState};
pub use protocol::Module;
pub use registry::{ModuleEntry, ModuleRegistry, RegistrySnapshot};

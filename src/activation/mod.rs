//! 激活协议
//!
//! 接口的默认实现按两阶段切换：`activate_interface` 只把接口放进待激活队列并发出通知，
//! 随后由 `process_pending_activations` 显式提升到激活目录。停用是即时的。
//!
//! 两把锁相互独立：持有目录锁时绝不获取队列锁。

pub mod directory;
pub mod queue;

pub use directory::ActiveDirectory;
pub use queue::PendingQueue;

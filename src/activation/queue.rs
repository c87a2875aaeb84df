//! 待激活队列
//!
//! 按请求顺序保存已请求激活但尚未提升的接口。同一个接口在队列中最多出现一次。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::module::{InterfaceDescriptor, InterfaceRef};

/// 待激活队列
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: Mutex<Vec<InterfaceRef>>,
}

impl PendingQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入队列
    ///
    /// 已在队列中时返回 `false`，不做任何修改。新加入时在队列锁内调用
    /// `on_enqueued`，调用方用它投递事件，保证事件顺序与队列顺序一致。
    /// `on_enqueued` 中不能再访问本队列。
    pub fn enqueue<F>(&self, descriptor: &Arc<InterfaceDescriptor>, on_enqueued: F) -> bool
    where
        F: FnOnce(InterfaceRef),
    {
        let mut items = self.items.lock();
        if items.iter().any(|r| r.points_to(descriptor)) {
            trace!(interface = %descriptor.name(), "接口已在待激活队列中");
            return false;
        }

        let reference = InterfaceRef::from(descriptor);
        items.push(reference.clone());
        descriptor.set_queued(true);
        debug!(
            interface = %descriptor.name(),
            uuid = %descriptor.uuid(),
            queue_len = items.len(),
            "接口加入待激活队列"
        );
        on_enqueued(reference);
        true
    }

    /// 取出全部条目（按请求顺序）
    pub fn take_all(&self) -> Vec<InterfaceRef> {
        std::mem::take(&mut *self.items.lock())
    }

    /// 从队列中移除指定接口
    pub fn remove(&self, descriptor: &Arc<InterfaceDescriptor>) -> bool {
        let mut items = self.items.lock();
        let removed = items.iter().any(|r| r.points_to(descriptor));
        // 顺带清理已失效的引用
        items.retain(|r| r.is_alive() && !r.points_to(descriptor));
        if removed {
            descriptor.set_queued(false);
        }
        removed
    }

    /// 是否包含指定接口
    pub fn contains(&self, descriptor: &Arc<InterfaceDescriptor>) -> bool {
        self.items.lock().iter().any(|r| r.points_to(descriptor))
    }

    /// 当前队列内容
    pub fn snapshot(&self) -> Vec<InterfaceRef> {
        self.items.lock().clone()
    }

    /// 队列长度
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

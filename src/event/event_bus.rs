//! 同步事件通道
//!
//! [`EventHandler<T>`] 是一个带固定负载类型的发布/订阅通道：
//!
//! - **同步分发**: `trigger` 在调用线程上按注册顺序依次调用订阅者
//! - **重入检测**: 订阅者在回调中再次 `trigger` 同一事件会得到
//!   [`HostError::ReentrantTrigger`]
//! - **延迟分发**: `post` 只把负载放进队列，`drain` 在调用方释放自己的锁之后再分发
//! - **订阅者隔离**: 单个订阅者 panic 不影响其他订阅者
//!
//! # 使用示例
//!
//! ```
//! use chips_host::event::EventHandler;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let event: EventHandler<bool> = EventHandler::new("OnInitialization");
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&hits);
//! let id = event.connect(move |ok: &bool| {
//!     if *ok {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }
//! });
//!
//! event.trigger(&true).unwrap();
//! event.disconnect(id).unwrap();
//! event.trigger(&true).unwrap();
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::utils::{HostError, Result};

/// 订阅者回调
pub type EventCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 订阅 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// 分发统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// 触发次数
    pub triggered: u64,
    /// 成功调用的回调次数
    pub delivered: u64,
    /// panic 的回调次数
    pub failed: u64,
}

/// 事件通道
pub struct EventHandler<T> {
    /// 事件名称（用于日志和错误信息）
    name: &'static str,

    next_id: AtomicU64,

    /// 订阅者，按注册顺序
    subscribers: Mutex<Vec<(HandlerId, EventCallback<T>)>>,

    /// 正在分发本事件的线程
    dispatching: Mutex<HashSet<ThreadId>>,

    /// 延迟分发队列
    outbox: Mutex<VecDeque<T>>,

    draining: AtomicBool,

    stats: Mutex<DispatchStats>,
}

impl<T> EventHandler<T> {
    /// 创建事件通道
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
            dispatching: Mutex::new(HashSet::new()),
            outbox: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            stats: Mutex::new(DispatchStats::default()),
        }
    }

    /// 事件名称
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 添加订阅者
    pub fn connect<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        debug!(event = self.name, handler = %id, "添加订阅者");
        id
    }

    /// 移除订阅者
    pub fn disconnect(&self, id: HandlerId) -> Result<()> {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        if subscribers.len() == before {
            return Err(HostError::NotFound(format!(
                "事件 '{}' 的订阅者 {}",
                self.name, id
            )));
        }
        debug!(event = self.name, handler = %id, "移除订阅者");
        Ok(())
    }

    /// 同步触发事件
    ///
    /// 按注册顺序调用触发时刻的所有订阅者，返回被调用的订阅者数量。
    /// 回调中新增或移除的订阅者从下一次触发开始生效。
    pub fn trigger(&self, payload: &T) -> Result<usize> {
        let current = thread::current().id();
        if !self.dispatching.lock().insert(current) {
            warn!(event = self.name, "检测到重入触发");
            return Err(HostError::ReentrantTrigger(self.name.to_string()));
        }

        let snapshot: Vec<(HandlerId, EventCallback<T>)> = self.subscribers.lock().clone();
        let mut delivered = 0u64;
        let mut failed = 0u64;

        for (id, callback) in &snapshot {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(payload);
            }));
            match outcome {
                Ok(()) => {
                    delivered += 1;
                    trace!(event = self.name, handler = %id, "回调完成");
                }
                Err(_) => {
                    failed += 1;
                    warn!(event = self.name, handler = %id, "回调 panic");
                }
            }
        }

        self.dispatching.lock().remove(&current);

        {
            let mut stats = self.stats.lock();
            stats.triggered += 1;
            stats.delivered += delivered;
            stats.failed += failed;
        }

        // 分发期间投递的负载
        if !self.outbox.lock().is_empty() {
            self.drain();
        }

        Ok(snapshot.len())
    }

    /// 投递负载，稍后由 [`EventHandler::drain`] 分发
    ///
    /// 可以在调用方持有自己的锁时调用，不会执行任何订阅者。
    pub fn post(&self, payload: T) {
        self.outbox.lock().push_back(payload);
    }

    /// 按投递顺序分发所有待分发的负载，返回分发的负载数量
    ///
    /// 另一个 `drain` 正在进行时直接返回 0，负载由正在进行的那一次分发。
    /// 当前线程正在分发本事件时同样返回 0，负载在外层触发结束后分发。
    pub fn drain(&self) -> usize {
        if self.dispatching.lock().contains(&thread::current().id()) {
            return 0;
        }

        let mut dispatched = 0;
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return dispatched;
            }

            while let Some(payload) = self.next_posted() {
                if let Err(e) = self.trigger(&payload) {
                    warn!(event = self.name, error = %e, "延迟分发失败");
                }
                dispatched += 1;
            }

            self.draining.store(false, Ordering::Release);

            // 释放标志后可能有新的投递
            if self.outbox.lock().is_empty() {
                return dispatched;
            }
        }
    }

    fn next_posted(&self) -> Option<T> {
        self.outbox.lock().pop_front()
    }

    /// 订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// 待分发的负载数量
    pub fn pending_posts(&self) -> usize {
        self.outbox.lock().len()
    }

    /// 分发统计
    pub fn stats(&self) -> DispatchStats {
        *self.stats.lock()
    }

    /// 移除所有订阅者
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }
}

impl<T> fmt::Debug for EventHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .field("pending", &self.pending_posts())
            .finish()
    }
}

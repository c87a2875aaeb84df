//! 宿主内置模块
//!
//! [`HostModule`] 在日志接口激活之前缓存模块日志。它订阅 `OnInterfaceActivation`，
//! 一旦请求激活的接口 UUID 为 [`LOG_MANAGER_UUID`] 且实现了 [`LogSink`]，
//! 就按原始顺序把缓存的日志重放给新的日志接口，然后清空缓存。
//! 之后激活的其他日志接口同样会被接管。

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::Application;
use crate::event::HandlerId;
use crate::module::{InterfaceRef, LogLevel, Module};
use crate::utils::id::uuid_from_words;
use crate::utils::{logger, Result};

/// 宿主内置模块的 UUID
pub const HOST_MODULE_UUID: Uuid = uuid_from_words(0x0C41_9500, 0x1D0C_4E2A, 0x9F3B_7A11, 0x5E60_0001);

/// 日志接口的能力 UUID
pub const LOG_MANAGER_UUID: Uuid = uuid_from_words(0x0C41_9500, 0x1D0C_4E2A, 0x9F3B_7A11, 0x5E60_0010);

/// 日志接口的约定名称
pub const LOG_MANAGER_NAME: &str = "LogManager";

/// 一条模块日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 日志内容
    pub message: String,
    /// 记录时间
    pub timestamp: DateTime<Utc>,
    /// 级别
    pub level: LogLevel,
}

impl LogRecord {
    /// 以当前时间创建日志
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            level,
        }
    }
}

/// 日志接收端
///
/// 日志接口通过 [`Interface::as_log_sink`](crate::module::Interface::as_log_sink) 暴露此能力。
pub trait LogSink: Send + Sync {
    /// 写入一条日志
    ///
    /// 重放期间持有宿主的缓存锁，实现中不能再通过 [`HostModule`] 写日志。
    fn write_record(&self, record: &LogRecord);
}

/// 宿主内置模块
pub struct HostModule {
    self_ref: Weak<HostModule>,
    app: RwLock<Weak<Application>>,
    buffer: Mutex<Vec<LogRecord>>,
    sink: Mutex<Option<InterfaceRef>>,
    subscription: Mutex<Option<HandlerId>>,
}

impl HostModule {
    /// 模块名称
    pub const NAME: &'static str = "ChipsHost";

    /// 创建模块
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            app: RwLock::new(Weak::new()),
            buffer: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            subscription: Mutex::new(None),
        })
    }

    /// 尚未重放的日志
    pub fn buffered(&self) -> Vec<LogRecord> {
        self.buffer.lock().clone()
    }

    /// 当前接管日志的接口
    pub fn current_sink(&self) -> Option<InterfaceRef> {
        self.sink.lock().clone()
    }

    fn on_interface_activation(&self, request: &InterfaceRef) {
        if request.uuid() != LOG_MANAGER_UUID {
            return;
        }
        let Some(descriptor) = request.upgrade() else {
            return;
        };
        let Some(sink) = descriptor.service().as_log_sink() else {
            warn!(interface = %request.name(), "日志接口没有实现 LogSink");
            return;
        };

        // 重放和切换接收端期间持有缓存锁，并发的 `log` 会等到接管完成
        let mut buffer = self.buffer.lock();
        let records = std::mem::take(&mut *buffer);
        for record in &records {
            sink.write_record(record);
        }
        *self.sink.lock() = Some(request.clone());
        drop(buffer);

        info!(
            interface = %request.name(),
            module = %descriptor.module_name(),
            replayed = records.len(),
            "日志接口接管"
        );
    }

    /// 当前可用的日志接收端
    ///
    /// 调用方需持有缓存锁（锁顺序：缓存 -> 接收端）。
    fn live_sink(&self) -> Option<Arc<crate::module::InterfaceDescriptor>> {
        let mut sink = self.sink.lock();
        let descriptor = sink
            .as_ref()
            .and_then(InterfaceRef::upgrade)
            .filter(|d| d.state().can_activate());
        if descriptor.is_none() && sink.is_some() {
            debug!("日志接口已注销，恢复缓存");
            *sink = None;
        }
        descriptor
    }
}

impl Module for HostModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn uuid(&self) -> Uuid {
        HOST_MODULE_UUID
    }

    fn init_library(&self, app: &Arc<Application>) -> Result<()> {
        *self.app.write() = Arc::downgrade(app);

        let weak = self.self_ref.clone();
        let id = app
            .events()
            .interface_activation
            .connect(move |request: &InterfaceRef| {
                if let Some(module) = weak.upgrade() {
                    module.on_interface_activation(request);
                }
            });
        *self.subscription.lock() = Some(id);
        Ok(())
    }

    fn deinit_library(&self) {
        let id = self.subscription.lock().take();
        if let (Some(id), Some(app)) = (id, self.app.read().upgrade()) {
            if let Err(e) = app.events().interface_activation.disconnect(id) {
                warn!(error = %e, "取消日志接口订阅失败");
            }
        }
    }

    fn property(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "name" => Some(serde_json::json!(Self::NAME)),
            "buffered_records" => Some(serde_json::json!(self.buffer.lock().len())),
            "log_manager" => self
                .current_sink()
                .map(|r| serde_json::json!(r.uuid().to_string())),
            _ => None,
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        logger::emit(level, Self::NAME, message);

        let record = LogRecord::now(level, message);
        let descriptor = {
            let mut buffer = self.buffer.lock();
            match self.live_sink() {
                Some(descriptor) => descriptor,
                None => {
                    buffer.push(record);
                    return;
                }
            }
        };
        if let Some(sink) = descriptor.service().as_log_sink() {
            sink.write_record(&record);
        }
    }
}

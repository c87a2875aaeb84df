//! 事件模块
//!
//! 生命周期信号的同步发布/订阅通道。

pub mod event_bus;

pub use event_bus::{DispatchStats, EventCallback, EventHandler, HandlerId};

use crate::module::InterfaceRef;

/// 应用级事件
#[derive(Debug)]
pub struct ApplicationEvents {
    /// 初始化完成（`true`）或反初始化（`false`）
    pub initialization: EventHandler<bool>,

    /// 应用被激活（`true`）或失去激活（`false`）
    pub activation: EventHandler<bool>,

    /// 应用即将关闭
    pub close: EventHandler<()>,

    /// 请求激活某个接口
    pub interface_activation: EventHandler<InterfaceRef>,
}

impl Default for ApplicationEvents {
    fn default() -> Self {
        Self {
            initialization: EventHandler::new("OnInitialization"),
            activation: EventHandler::new("OnActivation"),
            close: EventHandler::new("OnClose"),
            interface_activation: EventHandler::new("OnInterfaceActivation"),
        }
    }
}

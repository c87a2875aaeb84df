//! 模块生命周期驱动
//!
//! 按固定顺序调用模块的初始化钩子（库 → 管理器 → 属性 → 反射），
//! 反初始化按镜像顺序（反射 → 管理器 → 库）只调用已完成阶段对应的钩子。
//!
//! 钩子中的 panic 会被捕获并转换为 [`HostError::InitFailed`]，不会越过模块边界。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::metadata::ModuleState;
use super::protocol::Module;
use crate::api::Application;
use crate::utils::{HostError, Result};

/// 初始化阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InitStage {
    /// 库初始化
    Library,
    /// 管理器初始化
    Managers,
    /// 属性初始化
    Properties,
    /// 反射初始化
    Reflection,
}

impl InitStage {
    /// 初始化顺序
    pub const SEQUENCE: [InitStage; 4] = [
        InitStage::Library,
        InitStage::Managers,
        InitStage::Properties,
        InitStage::Reflection,
    ];

    /// 钩子名称
    pub fn hook_name(&self) -> &'static str {
        match self {
            InitStage::Library => "init_library",
            InitStage::Managers => "init_managers",
            InitStage::Properties => "init_properties",
            InitStage::Reflection => "init_reflection",
        }
    }

    /// 完成该阶段后模块所处的状态
    pub fn resulting_state(&self) -> ModuleState {
        match self {
            InitStage::Library => ModuleState::Loaded,
            InitStage::Managers => ModuleState::ManagersInitialized,
            InitStage::Properties => ModuleState::PropertiesInitialized,
            InitStage::Reflection => ModuleState::ReflectionInitialized,
        }
    }

    /// 处于指定状态的模块已完成的阶段
    pub fn completed_for(state: ModuleState) -> Vec<InitStage> {
        Self::SEQUENCE
            .iter()
            .copied()
            .filter(|stage| state.reached(stage.resulting_state()))
            .collect()
    }
}

/// 调用一个初始化钩子
pub fn run_init_stage(
    module: &Arc<dyn Module>,
    stage: InitStage,
    app: &Arc<Application>,
) -> Result<()> {
    let name = module.name().to_string();
    debug!(module = %name, hook = stage.hook_name(), "调用初始化钩子");

    let outcome = catch_unwind(AssertUnwindSafe(|| match stage {
        InitStage::Library => module.init_library(app),
        InitStage::Managers => module.init_managers(app),
        InitStage::Properties => module.init_properties(app),
        InitStage::Reflection => module.init_reflection(app),
    }));

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(module = %name, hook = stage.hook_name(), error = %e, "初始化钩子失败");
            Err(HostError::InitFailed(format!(
                "模块 '{}' 的 {} 失败: {}",
                name,
                stage.hook_name(),
                e
            )))
        }
        Err(_) => {
            error!(module = %name, hook = stage.hook_name(), "初始化钩子 panic");
            Err(HostError::InitFailed(format!(
                "模块 '{}' 的 {} panic",
                name,
                stage.hook_name()
            )))
        }
    }
}

/// 按镜像顺序调用已完成阶段的反初始化钩子
///
/// 返回实际调用的钩子名称。单个钩子 panic 只记录日志，后续钩子照常调用。
pub fn run_deinit(module: &Arc<dyn Module>, completed: &[InitStage]) -> Vec<&'static str> {
    let name = module.name().to_string();
    let mut called = Vec::new();

    let hooks: [(InitStage, &'static str, &dyn Fn()); 3] = [
        (InitStage::Reflection, "deinit_reflection", &|| module.deinit_reflection()),
        (InitStage::Managers, "deinit_managers", &|| module.deinit_managers()),
        (InitStage::Library, "deinit_library", &|| module.deinit_library()),
    ];

    for (stage, hook, call) in hooks {
        if !completed.contains(&stage) {
            continue;
        }
        debug!(module = %name, hook, "调用反初始化钩子");
        if catch_unwind(AssertUnwindSafe(call)).is_err() {
            error!(module = %name, hook, "反初始化钩子 panic");
        }
        called.push(hook);
    }

    info!(module = %name, hooks = called.len(), "模块反初始化完成");
    called
}

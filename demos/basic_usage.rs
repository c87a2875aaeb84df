//! 基本使用示例
//!
//! 本示例展示了薯片模块宿主的基本使用方法，包括：
//!
//! - 创建应用并注册进程内模块
//! - 注册接口、两阶段激活和替换默认实现
//! - 日志接口接管宿主缓存的日志
//! - 注销模块时的级联清理
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::any::Any;
use std::sync::{Arc, Weak};

use chips_host::{
    Application, HostConfig, HostModule, Interface, LogRecord, LogSink, Module, StaticLoader,
    LOG_MANAGER_UUID,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// 示例模块
struct DemoModule {
    name: &'static str,
    uuid: Uuid,
}

impl Module for DemoModule {
    fn name(&self) -> &str {
        self.name
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn init_library(&self, _app: &Arc<Application>) -> chips_host::Result<()> {
        println!("   [{}] init_library", self.name);
        Ok(())
    }

    fn deinit_library(&self) {
        println!("   [{}] deinit_library", self.name);
    }
}

/// 示例渲染器接口
struct Renderer {
    backend: &'static str,
    uuid: Uuid,
    owner: Weak<dyn Module>,
}

impl Interface for Renderer {
    fn interface_name(&self) -> &str {
        "Renderer"
    }

    fn interface_uuid(&self) -> Uuid {
        self.uuid
    }

    fn owner(&self) -> Option<Arc<dyn Module>> {
        self.owner.upgrade()
    }

    fn on_activate(&self) {
        println!("   渲染器 {} 成为默认实现", self.backend);
    }

    fn on_deactivate(&self) {
        println!("   渲染器 {} 不再是默认实现", self.backend);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 打印到标准输出的日志接口
struct ConsoleLog {
    owner: Weak<dyn Module>,
    written: Mutex<usize>,
}

impl LogSink for ConsoleLog {
    fn write_record(&self, record: &LogRecord) {
        *self.written.lock() += 1;
        println!(
            "   [log {} {:?}] {}",
            record.timestamp.format("%H:%M:%S"),
            record.level,
            record.message
        );
    }
}

impl Interface for ConsoleLog {
    fn interface_name(&self) -> &str {
        "LogManager"
    }

    fn interface_uuid(&self) -> Uuid {
        LOG_MANAGER_UUID
    }

    fn owner(&self) -> Option<Arc<dyn Module>> {
        self.owner.upgrade()
    }

    fn as_log_sink(&self) -> Option<&dyn LogSink> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 薯片模块宿主基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建应用并注册模块
    // -------------------------------------------------------------------------
    println!("1. 创建应用并注册模块...");
    let config = HostConfig::builder().app_name("demo").build();
    let app = Application::new(config, StaticLoader::new());

    let host = HostModule::new();
    app.register_module_instance(host.clone())?;
    let gl = app.register_module_instance(Arc::new(DemoModule {
        name: "OpenGL",
        uuid: Uuid::from_u128(0x100),
    }))?;
    app.register_module_instance(Arc::new(DemoModule {
        name: "Vulkan",
        uuid: Uuid::from_u128(0x200),
    }))?;
    app.initialize()?;
    println!("   ✅ 已注册 {} 个模块\n", app.module_count());

    // -------------------------------------------------------------------------
    // 2. 日志在日志接口激活前被缓存
    // -------------------------------------------------------------------------
    println!("2. 缓存日志...");
    host.log_info("宿主启动");
    host.log_warning("尚未配置日志接口");
    println!("   缓存中的日志: {}\n", host.buffered().len());

    // -------------------------------------------------------------------------
    // 3. 注册接口
    // -------------------------------------------------------------------------
    println!("3. 注册接口...");
    let opengl = app.get_module("OpenGL")?;
    let vulkan = app.get_module("Vulkan")?;

    let gl_renderer = app.register_interface(Arc::new(Renderer {
        backend: "OpenGL",
        uuid: Uuid::from_u128(0x101),
        owner: Arc::downgrade(&opengl),
    }))?;
    let vk_renderer = app.register_interface(Arc::new(Renderer {
        backend: "Vulkan",
        uuid: Uuid::from_u128(0x201),
        owner: Arc::downgrade(&vulkan),
    }))?;
    let console = app.register_interface(Arc::new(ConsoleLog {
        owner: Arc::downgrade(&opengl),
        written: Mutex::new(0),
    }))?;
    println!("   ✅ 接口注册完成\n");

    // -------------------------------------------------------------------------
    // 4. 两阶段激活
    // -------------------------------------------------------------------------
    println!("4. 激活日志接口和 OpenGL 渲染器...");
    app.activate_interface(&console)?;
    app.activate_interface(&gl_renderer)?;
    println!("   待激活: {}", app.pending_activations().len());
    println!(
        "   提升前 Renderer 是否激活: {}",
        app.get_active_interface("Renderer").is_ok()
    );
    let promoted = app.process_pending_activations();
    println!("   提升了 {} 个接口\n", promoted);

    // -------------------------------------------------------------------------
    // 5. 替换默认实现
    // -------------------------------------------------------------------------
    println!("5. 切换到 Vulkan 渲染器...");
    app.activate_interface(&vk_renderer)?;
    app.process_pending_activations();
    let active = app.get_active_interface("Renderer")?;
    println!("   当前默认实现来自模块: {}\n", active.module_name());

    // 按模块查找同名接口
    let scoped = app.get_interface_in("Renderer", Uuid::from_u128(0x100))?;
    println!("   OpenGL 模块中的 Renderer: {}\n", scoped.uuid());

    // -------------------------------------------------------------------------
    // 6. 注销模块
    // -------------------------------------------------------------------------
    println!("6. 注销 OpenGL 模块...");
    drop(opengl);
    app.unregister_module(&gl)?;
    println!(
        "   日志接口是否仍然激活: {}",
        app.get_active_interface(LOG_MANAGER_UUID).is_ok()
    );
    host.log_info("日志接口已随模块注销，重新缓存");
    println!("   缓存中的日志: {}\n", host.buffered().len());

    // -------------------------------------------------------------------------
    // 7. 关闭
    // -------------------------------------------------------------------------
    println!("7. 关闭应用...");
    app.stop_application()?;
    app.deinitialize()?;
    let unloaded = app.unload_all();
    println!("   ✅ 注销了 {} 个剩余模块", unloaded);

    println!("\n=== 示例完成 ===");
    Ok(())
}

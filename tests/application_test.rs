//! # 应用编排器集成测试
//!
//! 覆盖模块注册表、接口子注册表和激活协议的完整流程：
//! - 模块注册、冲突与拆除
//! - 接口注册、墓碑与按模块查找
//! - 两阶段激活、替换默认实现与停用
//! - 配置驱动的批量加载

use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread;

use chips_host::{
    Application, HostConfig, HostError, Interface, InterfaceState, Key, Module, ModuleState,
    StaticLoader,
};
use parking_lot::Mutex;
use uuid::Uuid;

// ============================================================================
// 测试辅助结构
// ============================================================================

type Journal = Arc<Mutex<Vec<String>>>;

/// 记录生命周期调用的模块
struct TestModule {
    name: &'static str,
    uuid: Uuid,
    fail_at: Option<&'static str>,
    journal: Journal,
}

impl TestModule {
    fn new(name: &'static str, uuid: u128) -> Arc<Self> {
        Arc::new(Self {
            name,
            uuid: Uuid::from_u128(uuid),
            fail_at: None,
            journal: Arc::default(),
        })
    }

    fn failing(name: &'static str, uuid: u128, hook: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            uuid: Uuid::from_u128(uuid),
            fail_at: Some(hook),
            journal: Arc::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    fn hook(&self, hook: &'static str) -> chips_host::Result<()> {
        self.journal.lock().push(hook.to_string());
        if self.fail_at == Some(hook) {
            return Err(HostError::Other(anyhow::anyhow!("{} 被配置为失败", hook)));
        }
        Ok(())
    }
}

impl Module for TestModule {
    fn name(&self) -> &str {
        self.name
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn init_library(&self, _app: &Arc<Application>) -> chips_host::Result<()> {
        self.hook("init_library")
    }

    fn init_managers(&self, _app: &Arc<Application>) -> chips_host::Result<()> {
        self.hook("init_managers")
    }

    fn init_properties(&self, _app: &Arc<Application>) -> chips_host::Result<()> {
        self.hook("init_properties")
    }

    fn init_reflection(&self, _app: &Arc<Application>) -> chips_host::Result<()> {
        self.hook("init_reflection")
    }

    fn deinit_reflection(&self) {
        self.journal.lock().push("deinit_reflection".to_string());
    }

    fn deinit_managers(&self) {
        self.journal.lock().push("deinit_managers".to_string());
    }

    fn deinit_library(&self) {
        self.journal.lock().push("deinit_library".to_string());
    }
}

/// 记录回调的接口
struct TestInterface {
    name: &'static str,
    uuid: Uuid,
    owner: Weak<dyn Module>,
    journal: Journal,
}

impl TestInterface {
    fn new(name: &'static str, uuid: u128, owner: &Arc<dyn Module>) -> Arc<Self> {
        Arc::new(Self {
            name,
            uuid: Uuid::from_u128(uuid),
            owner: Arc::downgrade(owner),
            journal: Arc::default(),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.journal.lock().clone()
    }
}

impl Interface for TestInterface {
    fn interface_name(&self) -> &str {
        self.name
    }

    fn interface_uuid(&self) -> Uuid {
        self.uuid
    }

    fn owner(&self) -> Option<Arc<dyn Module>> {
        self.owner.upgrade()
    }

    fn initialize(&self, _owner: &Arc<dyn Module>) -> chips_host::Result<()> {
        self.journal.lock().push("initialize".to_string());
        Ok(())
    }

    fn deinitialize(&self) {
        self.journal.lock().push("deinitialize".to_string());
    }

    fn on_activate(&self) {
        self.journal.lock().push("on_activate".to_string());
    }

    fn on_deactivate(&self) {
        self.journal.lock().push("on_deactivate".to_string());
    }

    fn on_changing_default(&self, replacement: Option<&chips_host::InterfaceRef>) {
        let entry = match replacement {
            Some(r) => format!("on_changing_default:{}", r.module_uuid()),
            None => "on_changing_default:none".to_string(),
        };
        self.journal.lock().push(entry);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn static_app() -> Arc<Application> {
    Application::new(HostConfig::default(), StaticLoader::new())
}

/// 注册模块并返回注册表中的实例
fn add_module(app: &Arc<Application>, module: Arc<TestModule>) -> Arc<dyn Module> {
    let uuid = module.uuid;
    app.register_module_instance(module).unwrap();
    app.get_module(uuid).unwrap()
}

// ============================================================================
// 模块注册
// ============================================================================

#[test]
fn test_register_module_runs_init_hooks_in_order() {
    let app = static_app();
    let module = TestModule::new("Core", 1);
    let handle = app.register_module_instance(module.clone()).unwrap();

    assert_eq!(handle.name(), "Core");
    assert_eq!(handle.uuid(), Uuid::from_u128(1));
    assert_eq!(
        module.calls(),
        vec!["init_library", "init_managers", "init_properties", "init_reflection"]
    );

    let info = app.module_info("Core").unwrap();
    assert_eq!(info.state, ModuleState::ReflectionInitialized);
    assert!(app.check_consistency().is_ok());
}

#[test]
fn test_duplicate_uuid_is_conflict_and_state_unchanged() {
    let app = static_app();
    app.register_module_instance(TestModule::new("Core", 1)).unwrap();
    app.register_module_instance(TestModule::new("Renderer", 2)).unwrap();

    let before = app.registry_snapshot();
    let err = app
        .register_module_instance(TestModule::new("Impostor", 1))
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(matches!(err, HostError::DuplicateUuid(_)));
    assert_eq!(app.registry_snapshot(), before);
    assert!(app.check_consistency().is_ok());
}

#[test]
fn test_duplicate_name_is_conflict() {
    let app = static_app();
    app.register_module_instance(TestModule::new("Core", 1)).unwrap();

    let impostor = TestModule::new("Core", 9);
    let err = app.register_module_instance(impostor.clone()).unwrap_err();

    assert!(matches!(err, HostError::DuplicateName(_)));
    // 冲突的模块不会收到任何钩子
    assert!(impostor.calls().is_empty());
    assert_eq!(app.module_count(), 1);
}

#[test]
fn test_indices_agree_across_register_and_unregister() {
    let app = static_app();
    let mut handles = Vec::new();
    for (i, name) in ["A", "B", "C", "D", "E"].into_iter().enumerate() {
        handles.push(
            app.register_module_instance(TestModule::new(name, i as u128 + 1))
                .unwrap(),
        );
    }

    app.unregister_module(&handles[1]).unwrap();
    app.unregister_module(&handles[3]).unwrap();
    app.register_module_instance(TestModule::new("F", 6)).unwrap();
    app.unregister_module(&handles[0]).unwrap();

    assert!(app.check_consistency().is_ok());
    let snapshot = app.registry_snapshot();
    let names: Vec<&str> = snapshot.modules.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names.len(), 3);
    for entry in &snapshot.modules {
        assert_eq!(app.get_module(entry.name.as_str()).unwrap().uuid(), entry.uuid);
        assert_eq!(app.get_module(entry.uuid).unwrap().name(), entry.name);
    }
}

#[test]
fn test_init_failure_tears_down_completed_stages() {
    let app = static_app();
    let module = TestModule::failing("Broken", 7, "init_properties");
    let err = app.register_module_instance(module.clone()).unwrap_err();

    assert!(matches!(err, HostError::InitFailed(_)));
    assert_eq!(
        module.calls(),
        vec![
            "init_library",
            "init_managers",
            "init_properties",
            "deinit_managers",
            "deinit_library"
        ]
    );
    assert_eq!(app.module_count(), 0);
    assert!(matches!(app.get_module("Broken"), Err(e) if e.is_not_found()));
}

#[test]
fn test_unregister_module_runs_deinit_in_mirror_order() {
    let app = static_app();
    let module = TestModule::new("Core", 1);
    let handle = app.register_module_instance(module.clone()).unwrap();

    app.unregister_module(&handle).unwrap();

    let calls = module.calls();
    assert_eq!(
        &calls[4..],
        &["deinit_reflection", "deinit_managers", "deinit_library"]
    );
    assert!(app.unregister_module(&handle).unwrap_err().is_not_found());
}

#[test]
fn test_load_errors_from_loader() {
    let loader = StaticLoader::new()
        .with_null_descriptor("null.so")
        .with_missing_symbol("foreign.so");
    let app = Application::new(HostConfig::default(), loader);

    assert!(matches!(
        app.register_module("missing.so"),
        Err(HostError::LoadFailed { .. })
    ));
    assert!(matches!(
        app.register_module("foreign.so"),
        Err(HostError::ProtocolMismatch { .. })
    ));
    assert!(matches!(
        app.register_module("null.so"),
        Err(HostError::NullDescriptor(_))
    ));
    assert!(matches!(
        app.register_module(""),
        Err(HostError::NullArgument(_))
    ));
    assert_eq!(app.module_count(), 0);
}

#[test]
fn test_register_module_from_path_records_path() {
    let loader = StaticLoader::new().with_module("modules/core.so", || {
        let module: Arc<dyn Module> = TestModule::new("Core", 1);
        module
    });
    let app = Application::new(HostConfig::default(), loader);

    let handle = app.register_module("modules/core.so").unwrap();
    assert_eq!(handle.name(), "Core");
    assert_eq!(
        app.module_info(Uuid::from_u128(1)).unwrap().path,
        Some(PathBuf::from("modules/core.so"))
    );
}

// ============================================================================
// 接口注册
// ============================================================================

#[test]
fn test_register_interface_initializes_once() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let log = TestInterface::new("LogManager", 2, &core);

    let descriptor = app.register_interface(log.clone()).unwrap();

    assert_eq!(descriptor.state(), InterfaceState::Initialized);
    assert_eq!(descriptor.module_uuid(), Uuid::from_u128(1));
    assert_eq!(log.calls(), vec!["initialize"]);
    assert!(app.get_interface_in("LogManager", Uuid::from_u128(1)).is_ok());
}

#[test]
fn test_register_interface_rejects_unknown_owner() {
    let app = static_app();
    let stray: Arc<dyn Module> = TestModule::new("Stray", 5);
    let service = TestInterface::new("Renderer", 6, &stray);

    let err = app.register_interface(service).unwrap_err();
    assert!(matches!(err, HostError::ModuleNotRegistered { .. }));
}

#[test]
fn test_register_interface_rejects_same_uuid_other_instance() {
    let app = static_app();
    add_module(&app, TestModule::new("Core", 1));
    let twin: Arc<dyn Module> = TestModule::new("Core", 1);
    let service = TestInterface::new("Renderer", 6, &twin);

    let err = app.register_interface(service).unwrap_err();
    assert!(matches!(err, HostError::ModuleMismatch { .. }));
}

#[test]
fn test_register_interface_duplicate_in_module() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    app.register_interface(TestInterface::new("Renderer", 2, &core))
        .unwrap();

    let err = app
        .register_interface(TestInterface::new("Renderer", 3, &core))
        .unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn test_unregister_interface_tombstones_without_shifting_siblings() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let module_uuid = Uuid::from_u128(1);

    app.register_interface(TestInterface::new("Alpha", 10, &core))
        .unwrap();
    let beta = TestInterface::new("Beta", 11, &core);
    app.register_interface(beta.clone()).unwrap();
    app.register_interface(TestInterface::new("Gamma", 12, &core))
        .unwrap();

    let slots_before = app.registry_snapshot().interfaces[0].1.clone();

    let beta_dyn: Arc<dyn Interface> = beta.clone();
    app.unregister_interface(&beta_dyn).unwrap();

    assert!(app
        .get_interface_in("Beta", module_uuid)
        .unwrap_err()
        .is_not_found());
    assert_eq!(beta.calls(), vec!["initialize", "deinitialize"]);

    let slots_after = app.registry_snapshot().interfaces[0].1.clone();
    for name in ["Alpha", "Gamma"] {
        let before = slots_before.iter().find(|e| e.name == name).unwrap();
        let after = slots_after.iter().find(|e| e.name == name).unwrap();
        assert_eq!(before.slot, after.slot);
        assert!(app.get_interface_in(name, module_uuid).is_ok());
    }
    assert!(app.check_consistency().is_ok());
}

#[test]
fn test_scoped_lookup_across_modules() {
    let app = static_app();
    let a = add_module(&app, TestModule::new("ModuleA", 1));
    let b = add_module(&app, TestModule::new("ModuleB", 2));

    let ra = app
        .register_interface(TestInterface::new("Renderer", 100, &a))
        .unwrap();
    let rb = app
        .register_interface(TestInterface::new("Renderer", 200, &b))
        .unwrap();

    let found_a = app.get_interface_in("Renderer", Uuid::from_u128(1)).unwrap();
    let found_b = app.get_interface_in("Renderer", Uuid::from_u128(2)).unwrap();
    assert!(Arc::ptr_eq(&found_a, &ra));
    assert!(Arc::ptr_eq(&found_b, &rb));
    assert_ne!(found_a.uuid(), found_b.uuid());

    let err = app
        .get_interface_in("Renderer", Uuid::from_u128(999))
        .unwrap_err();
    assert!(err.is_not_found());

    // 未指定模块时按注册顺序返回第一个
    assert!(Arc::ptr_eq(&app.get_interface("Renderer").unwrap(), &ra));
}

#[test]
fn test_invalid_keys_are_null_arguments() {
    let app = static_app();
    assert!(matches!(
        app.get_interface(""),
        Err(HostError::NullArgument(_))
    ));
    assert!(matches!(
        app.deactivate_interface(Uuid::nil()),
        Err(HostError::NullArgument(_))
    ));
    assert!(matches!(
        app.get_active_interface(Key::Name("")),
        Err(HostError::NullArgument(_))
    ));
}

// ============================================================================
// 激活协议
// ============================================================================

#[test]
fn test_activation_is_two_phase() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let log = TestInterface::new("LogManager", 2, &core);
    let descriptor = app.register_interface(log.clone()).unwrap();

    app.activate_interface(&descriptor).unwrap();

    assert!(matches!(
        app.get_active_interface("LogManager"),
        Err(HostError::NotActive(_))
    ));
    assert!(descriptor.is_queued());
    assert_eq!(app.pending_activations().len(), 1);

    assert_eq!(app.process_pending_activations(), 1);

    let active = app.get_active_interface("LogManager").unwrap();
    assert!(Arc::ptr_eq(&active, &descriptor));
    assert!(Arc::ptr_eq(
        &app.get_active_interface(Uuid::from_u128(2)).unwrap(),
        &descriptor
    ));
    assert_eq!(descriptor.state(), InterfaceState::Active);
    assert!(!descriptor.is_queued());
    assert_eq!(log.calls(), vec!["initialize", "on_activate"]);
    assert!(app.pending_activations().is_empty());
}

#[test]
fn test_activate_twice_enqueues_once() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let descriptor = app
        .register_interface(TestInterface::new("LogManager", 2, &core))
        .unwrap();

    let requests = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&requests);
    app.events()
        .interface_activation
        .connect(move |_| *counter.lock() += 1);

    app.activate_interface(&descriptor).unwrap();
    app.activate_interface(&descriptor).unwrap();

    assert_eq!(app.pending_activations().len(), 1);
    assert_eq!(*requests.lock(), 1);
}

#[test]
fn test_deactivate_never_activated_is_not_active() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    app.register_interface(TestInterface::new("LogManager", 2, &core))
        .unwrap();

    assert!(matches!(
        app.deactivate_interface("LogManager"),
        Err(HostError::NotActive(_))
    ));
    assert!(matches!(
        app.deactivate_interface("Nothing"),
        Err(HostError::NotActive(_))
    ));
}

#[test]
fn test_deactivate_is_immediate() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let log = TestInterface::new("LogManager", 2, &core);
    let descriptor = app.register_interface(log.clone()).unwrap();
    app.activate_interface(&descriptor).unwrap();
    app.process_pending_activations();

    app.deactivate_interface(Uuid::from_u128(2)).unwrap();

    assert!(app.get_active_interface("LogManager").is_err());
    assert_eq!(descriptor.state(), InterfaceState::Initialized);
    assert_eq!(
        log.calls(),
        vec![
            "initialize",
            "on_activate",
            "on_changing_default:none",
            "on_deactivate"
        ]
    );
    assert!(app.active_snapshot().is_empty());
}

#[test]
fn test_promotion_replaces_previous_default() {
    let app = static_app();
    let a = add_module(&app, TestModule::new("ModuleA", 1));
    let b = add_module(&app, TestModule::new("ModuleB", 2));
    let first = TestInterface::new("Renderer", 100, &a);
    let second = TestInterface::new("Renderer", 200, &b);
    let da = app.register_interface(first.clone()).unwrap();
    let db = app.register_interface(second.clone()).unwrap();

    app.activate_interface(&da).unwrap();
    app.process_pending_activations();
    app.activate_interface(&db).unwrap();
    app.process_pending_activations();

    let active = app.get_active_interface("Renderer").unwrap();
    assert!(Arc::ptr_eq(&active, &db));
    assert_eq!(da.state(), InterfaceState::Initialized);
    assert!(app.get_active_interface(Uuid::from_u128(100)).is_err());
    assert_eq!(
        first.calls(),
        vec![
            "initialize".to_string(),
            "on_activate".to_string(),
            format!("on_changing_default:{}", Uuid::from_u128(2)),
            "on_deactivate".to_string()
        ]
    );
    assert_eq!(second.calls(), vec!["initialize", "on_activate"]);
    assert!(app.check_consistency().is_ok());
}

#[test]
fn test_concurrent_activation_keeps_directory_consistent() {
    let app = static_app();
    let descriptors: Vec<_> = ["GL", "VK", "DX", "MT"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let module = add_module(&app, TestModule::new(name, 10 + i as u128));
            app.register_interface(TestInterface::new("Renderer", 99, &module))
                .unwrap()
        })
        .collect();

    let workers: Vec<_> = (0..8usize)
        .map(|t| {
            let app = Arc::clone(&app);
            let descriptors = descriptors.clone();
            thread::spawn(move || {
                for n in 0..500usize {
                    let descriptor = &descriptors[(t + n) % descriptors.len()];
                    match n % 4 {
                        0 => app.activate_interface(descriptor).unwrap(),
                        1 => {
                            app.process_pending_activations();
                        }
                        2 => {
                            let _ = app.deactivate_interface("Renderer");
                        }
                        _ => {
                            let _ = app.get_active_interface(Uuid::from_u128(99));
                        }
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    app.process_pending_activations();

    assert!(app.check_consistency().is_ok());
    assert!(app.pending_activations().is_empty());
    assert!(app.active_snapshot().len() <= 1);

    let active = app.get_active_interface("Renderer").ok();
    for descriptor in &descriptors {
        let is_current = active
            .as_ref()
            .is_some_and(|a| Arc::ptr_eq(a, descriptor));
        assert_eq!(descriptor.is_active(), is_current);
        assert!(!descriptor.is_queued());
    }
}

#[test]
fn test_activate_unregistered_interface_fails() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let service = TestInterface::new("LogManager", 2, &core);
    let descriptor = app.register_interface(service.clone()).unwrap();

    let service_dyn: Arc<dyn Interface> = service;
    app.unregister_interface(&service_dyn).unwrap();

    assert!(matches!(
        app.activate_interface(&descriptor),
        Err(HostError::InvalidState(_))
    ));
}

#[test]
fn test_unregister_interface_cancels_pending_request() {
    let app = static_app();
    let core = add_module(&app, TestModule::new("Core", 1));
    let service = TestInterface::new("LogManager", 2, &core);
    let descriptor = app.register_interface(service.clone()).unwrap();
    app.activate_interface(&descriptor).unwrap();

    let service_dyn: Arc<dyn Interface> = service;
    app.unregister_interface(&service_dyn).unwrap();

    assert!(app.pending_activations().is_empty());
    assert_eq!(app.process_pending_activations(), 0);
    assert!(app.get_active_interface("LogManager").is_err());
}

#[test]
fn test_unregister_module_cascades_to_interfaces() {
    let app = static_app();
    let module = TestModule::new("Core", 1);
    let handle = app.register_module_instance(module.clone()).unwrap();
    let core = app.get_module("Core").unwrap();

    let log = TestInterface::new("LogManager", 2, &core);
    let renderer = TestInterface::new("Renderer", 3, &core);
    let dl = app.register_interface(log.clone()).unwrap();
    let dr = app.register_interface(renderer.clone()).unwrap();
    app.activate_interface(&dl).unwrap();
    app.activate_interface(&dr).unwrap();
    app.process_pending_activations();
    drop(core);

    app.unregister_module(&handle).unwrap();

    for name in ["LogManager", "Renderer"] {
        assert!(matches!(
            app.get_active_interface(name),
            Err(HostError::NotActive(_))
        ));
        assert!(app
            .get_interface_in(name, Uuid::from_u128(1))
            .unwrap_err()
            .is_not_found());
    }
    assert_eq!(dl.state(), InterfaceState::Deinitialized);
    assert_eq!(
        log.calls(),
        vec![
            "initialize",
            "on_activate",
            "on_changing_default:none",
            "on_deactivate",
            "deinitialize"
        ]
    );
    // 接口先于模块的反初始化钩子被拆除
    assert_eq!(module.calls().last().map(String::as_str), Some("deinit_library"));
    assert!(app.active_snapshot().is_empty());
}

#[test]
fn test_get_interface_prefers_active() {
    let app = static_app();
    let a = add_module(&app, TestModule::new("ModuleA", 1));
    let b = add_module(&app, TestModule::new("ModuleB", 2));
    app.register_interface(TestInterface::new("Renderer", 100, &a))
        .unwrap();
    let db = app
        .register_interface(TestInterface::new("Renderer", 200, &b))
        .unwrap();

    app.activate_interface(&db).unwrap();
    app.process_pending_activations();

    assert!(Arc::ptr_eq(&app.get_interface("Renderer").unwrap(), &db));
}

// ============================================================================
// 配置与应用生命周期
// ============================================================================

fn configured_loader() -> StaticLoader {
    StaticLoader::new()
        .with_module("a.so", || {
            let module: Arc<dyn Module> = TestModule::new("A", 1);
            module
        })
        .with_module("c.so", || {
            let module: Arc<dyn Module> = TestModule::new("C", 3);
            module
        })
}

#[test]
fn test_set_config_is_fail_open() {
    let app = Application::new(HostConfig::default(), configured_loader());
    let config = HostConfig::builder()
        .app_name("demo")
        .module_path("a.so")
        .module_path("b.so")
        .module_path("c.so")
        .build();

    let report = app.set_config(config);

    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, PathBuf::from("b.so"));
    assert!(!report.aborted);
    assert!(!report.is_complete());
    assert_eq!(app.app_name(), "demo");
    assert_eq!(app.module_count(), 2);
}

#[test]
fn test_set_config_fail_fast_stops_at_first_error() {
    let app = Application::new(HostConfig::default(), configured_loader());
    let config = HostConfig::builder()
        .module_path("a.so")
        .module_path("b.so")
        .module_path("c.so")
        .fail_fast()
        .build();

    let report = app.set_config(config);

    assert_eq!(report.loaded.len(), 1);
    assert!(report.aborted);
    assert!(app.get_module("C").is_err());
}

#[test]
fn test_application_lifecycle_events() {
    let app = static_app();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    app.events()
        .initialization
        .connect(move |v| s.lock().push(format!("init:{}", v)));
    let s = Arc::clone(&seen);
    app.events()
        .activation
        .connect(move |v| s.lock().push(format!("active:{}", v)));
    let s = Arc::clone(&seen);
    app.events()
        .close
        .connect(move |_| s.lock().push("close".to_string()));

    app.initialize().unwrap();
    assert!(matches!(app.initialize(), Err(HostError::InvalidState(_))));
    app.start_application();
    app.on_activate().unwrap();
    assert!(app.is_active());
    app.stop_application().unwrap();
    app.stop_application().unwrap();
    assert!(app.has_to_stop());
    app.on_deactivate().unwrap();
    app.deinitialize().unwrap();
    assert!(!app.is_initialized());

    assert_eq!(
        *seen.lock(),
        vec!["init:true", "active:true", "close", "active:false", "init:false"]
    );
}

#[test]
fn test_activation_event_fires_only_on_transition() {
    let app = static_app();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    app.events().activation.connect(move |v| s.lock().push(*v));

    app.on_deactivate().unwrap();
    app.on_activate().unwrap();
    app.on_activate().unwrap();
    assert!(app.is_active());
    app.on_deactivate().unwrap();
    app.on_deactivate().unwrap();
    assert!(!app.is_active());

    assert_eq!(*seen.lock(), vec![true, false]);
}

#[test]
fn test_unload_all_in_reverse_order() {
    let app = static_app();
    let order = Arc::new(Mutex::new(Vec::new()));

    struct Ordered {
        name: &'static str,
        uuid: Uuid,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Module for Ordered {
        fn name(&self) -> &str {
            self.name
        }

        fn uuid(&self) -> Uuid {
            self.uuid
        }

        fn deinit_library(&self) {
            self.order.lock().push(self.name);
        }
    }

    for (i, name) in ["first", "second", "third"].into_iter().enumerate() {
        app.register_module_instance(Arc::new(Ordered {
            name,
            uuid: Uuid::from_u128(i as u128 + 1),
            order: Arc::clone(&order),
        }))
        .unwrap();
    }

    assert_eq!(app.unload_all(), 3);
    assert_eq!(*order.lock(), vec!["third", "second", "first"]);
    assert_eq!(app.module_count(), 0);
}

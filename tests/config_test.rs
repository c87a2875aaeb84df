//! 配置加载集成测试
//!
//! 测试配置文件的读取、格式识别与批量加载

use std::path::PathBuf;
use std::sync::Arc;

use chips_host::{Application, HostConfig, HostError, Module, StaticLoader};
use tempfile::TempDir;
use uuid::Uuid;

/// 测试加载 YAML 配置
#[tokio::test]
async fn test_load_yaml_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("host.yaml");
    tokio::fs::write(
        &path,
        r#"
application:
  name: editor
  version: 3
modules:
  paths:
    - modules/core.so
    - modules/renderer.so
  fail_fast: true
logging:
  level: debug
  json_format: true
  rotation: hourly
"#,
    )
    .await
    .unwrap();

    let config = HostConfig::from_file(&path).await.unwrap();

    assert_eq!(config.config_path, Some(path));
    assert_eq!(config.application.name, "editor");
    assert_eq!(config.application.version, 3);
    assert_eq!(
        config.modules.paths,
        vec![
            PathBuf::from("modules/core.so"),
            PathBuf::from("modules/renderer.so")
        ]
    );
    assert!(config.modules.fail_fast);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
    assert_eq!(config.logging.rotation, "hourly");
    assert!(!config.dev_mode);
}

/// 测试按扩展名识别 JSON 配置
#[tokio::test]
async fn test_load_json_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("host.json");
    tokio::fs::write(
        &path,
        r#"{
  "application": { "name": "viewer" },
  "modules": { "paths": ["a.so"] },
  "dev_mode": true
}"#,
    )
    .await
    .unwrap();

    let config = HostConfig::from_file(&path).await.unwrap();

    assert_eq!(config.application.name, "viewer");
    // 未指定的字段使用默认值
    assert_eq!(config.application.version, 1);
    assert_eq!(config.modules.paths, vec![PathBuf::from("a.so")]);
    assert!(!config.modules.fail_fast);
    assert_eq!(config.logging.level, "info");
    assert!(config.dev_mode);
}

/// 测试缺失的配置文件
#[tokio::test]
async fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = HostConfig::from_file(temp_dir.path().join("absent.yaml"))
        .await
        .unwrap_err();

    assert!(matches!(err, HostError::ConfigLoadFailed(_)));
}

/// 测试格式错误的配置文件
#[tokio::test]
async fn test_malformed_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    tokio::fs::write(&path, "{ \"application\": ").await.unwrap();

    let err = HostConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(err, HostError::Json(_)));
}

/// 测试配置合并只覆盖非默认值
#[test]
fn test_merge_overrides() {
    let mut base = HostConfig::builder()
        .app_name("base")
        .module_path("core.so")
        .log_level("warn")
        .build();

    let overlay = HostConfig::builder()
        .module_path("extra.so")
        .json_logging()
        .build();

    base.merge(overlay);

    assert_eq!(base.application.name, "base");
    assert_eq!(
        base.modules.paths,
        vec![PathBuf::from("core.so"), PathBuf::from("extra.so")]
    );
    assert_eq!(base.logging.level, "warn");
    assert!(base.logging.json_format);
}

struct Named(&'static str, u128);

impl Module for Named {
    fn name(&self) -> &str {
        self.0
    }

    fn uuid(&self) -> Uuid {
        Uuid::from_u128(self.1)
    }
}

/// 测试从文件加载的配置驱动模块注册
#[tokio::test]
async fn test_config_file_drives_module_loading() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("host.yaml");
    tokio::fs::write(
        &path,
        r#"
modules:
  paths:
    - core.so
    - missing.so
    - renderer.so
"#,
    )
    .await
    .unwrap();

    let loader = StaticLoader::new()
        .with_module("core.so", || {
            let module: Arc<dyn Module> = Arc::new(Named("Core", 1));
            module
        })
        .with_module("renderer.so", || {
            let module: Arc<dyn Module> = Arc::new(Named("Renderer", 2));
            module
        });
    let app = Application::new(HostConfig::default(), loader);

    let config = HostConfig::from_file(&path).await.unwrap();
    let report = app.set_config(config);

    assert_eq!(report.loaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].1, HostError::LoadFailed { .. }));
    let names: Vec<String> = app.modules().into_iter().map(|m| m.name).collect();
    assert_eq!(names, vec!["Core", "Renderer"]);
    assert_eq!(app.config().config_path, Some(path));
}

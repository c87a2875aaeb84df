//! Chips Host 命令行入口
//!
//! 薯片模块宿主的命令行工具。
//!
//! # 命令概览
//!
//! - `run` - 加载配置中的模块并运行，Ctrl+C 退出
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 使用默认配置文件运行
//! chips-host run
//!
//! # 额外加载一个模块
//! chips-host -c host.yaml run -m modules/librenderer.so
//!
//! # 检查配置文件
//! chips-host check-config -c host.yaml
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{info, warn};

use chips_host::{Application, DylibLoader, HostConfig, HostModule, Logger, LoggerConfig};

/// Chips Host - 薯片模块宿主
#[derive(Parser)]
#[command(name = "chips-host")]
#[command(version, about = "薯片模块宿主", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "chips-host.yaml", global = true)]
    config: PathBuf,

    /// 日志级别（覆盖配置文件）
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 开发模式
    #[arg(long, global = true)]
    dev: bool,

    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 加载模块并运行
    ///
    /// 按顺序注册配置中列出的模块，单个模块失败不会中止启动。
    /// 按 Ctrl+C 停止并注销所有模块。
    Run {
        /// 额外加载的模块路径
        #[arg(short, long)]
        module: Vec<PathBuf>,
    },

    /// 验证配置文件
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 查看版本信息
    Version,
}

/// 加载配置文件，不存在时使用默认配置
async fn load_config(path: &Path) -> Result<HostConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        let config = HostConfig::from_file(path).await?;
        info!(path = %path.display(), "已加载配置文件");
        Ok(config)
    } else {
        info!(path = %path.display(), "配置文件不存在，使用默认配置");
        Ok(HostConfig::default())
    }
}

async fn run(mut config: HostConfig, extra: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    config.modules.paths.extend(extra);

    let app = Application::new(HostConfig::default(), DylibLoader::new());
    app.register_module_instance(HostModule::new())?;

    let report = app.set_config(config);
    for (path, e) in &report.failed {
        warn!(path = %path.display(), code = e.error_code(), "模块未加载: {}", e);
    }

    app.initialize()?;
    app.process_pending_activations();
    app.start_application();
    app.on_activate()?;

    println!();
    println!("薯片模块宿主已启动: {} v{}", app.app_name(), app.app_version());
    println!("  已加载模块: {}", app.module_count());
    for module in app.modules() {
        println!("    - {} {{{}}} [{}]", module.name, module.uuid, module.state);
    }
    println!("  构建: {}", Application::compilation_info());
    println!("  按 Ctrl+C 停止");
    println!();

    signal::ctrl_c().await?;

    info!("收到关闭信号，正在停止...");
    app.stop_application()?;
    app.on_deactivate()?;
    app.deinitialize()?;
    let unloaded = app.unload_all();
    info!(unloaded, "薯片模块宿主已停止");
    Ok(())
}

async fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("检查配置文件: {}", path.display());
    println!();

    let config = match HostConfig::from_file(path).await {
        Ok(config) => config,
        Err(e) => {
            println!("❌ 配置文件无效: {}", e);
            return Err(Box::new(e));
        }
    };

    println!("✅ 配置文件有效！");
    println!("────────────────────────────────────────");
    println!("  [应用]");
    println!("    名称:           {}", config.application.name);
    println!("    版本:           {}", config.application.version);
    println!();
    println!("  [模块]");
    for path in &config.modules.paths {
        let marker = if path.exists() { "✓" } else { "✗" };
        println!("    {} {}", marker, path.display());
    }
    println!(
        "    失败即中止:     {}",
        if config.modules.fail_fast { "是" } else { "否" }
    );
    println!();
    println!("  [日志]");
    println!("    日志级别:       {}", config.logging.level);
    println!(
        "    文件输出:       {}",
        if config.logging.file_output { "是" } else { "否" }
    );
    println!(
        "    JSON 格式:      {}",
        if config.logging.json_format { "是" } else { "否" }
    );
    println!("────────────────────────────────────────");
    Ok(())
}

fn print_version() {
    println!("Chips Host - 薯片模块宿主");
    println!("  版本:       {}", chips_host::VERSION);
    println!("  入口符号:   {}", chips_host::module::MODULE_ENTRY_SYMBOL);
    println!("  构建:       {}", Application::compilation_info());
    println!("  平台:       {}-{}", std::env::consts::ARCH, std::env::consts::OS);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => print_version(),

        Some(Commands::CheckConfig { config }) => {
            let path = config.unwrap_or(cli.config);
            check_config(&path).await?;
        }

        Some(Commands::Run { module }) => {
            let mut config = load_config(&cli.config).await?;
            if let Some(level) = cli.log_level {
                config.logging.level = level;
            }
            if cli.dev {
                config.dev_mode = true;
            }
            let _guard = Logger::init(LoggerConfig::from_log_config(&config.logging))?;
            run(config, module).await?;
        }

        None => {
            let _guard = Logger::try_init(LoggerConfig::default());
            let config = load_config(&cli.config).await?;
            run(config, Vec::new()).await?;
        }
    }

    Ok(())
}

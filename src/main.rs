use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use grid_scheduler::{wait_for_shutdown_signal, AppMode, Application, ShutdownManager};
use scheduler_config::AppConfig;
use scheduler_core::{init_logging, LogFormat};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// 收到关闭信号后等待服务退出的时间
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
/// 关闭运行时时等待阻塞线程（领取Worker、执行任务）的时间
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let matches = Command::new("scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("分布式作业调度与资源分配系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时按默认路径查找"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["dispatcher", "worker"])
                .default_value("dispatcher"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("Worker ID (仅在worker模式下使用)"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("监听地址，覆盖配置文件"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("dispatcher");
    let mode = AppMode::parse(mode_str)?;

    let mut config = AppConfig::load(config_path.map(String::as_str))
        .context("加载配置失败")?;
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }
    if let Some(id) = matches.get_one::<String>("worker-id") {
        config.worker.worker_id = id.clone();
    }
    if let Some(bind) = matches.get_one::<String>("bind") {
        match mode {
            AppMode::Dispatcher => config.dispatcher.bind_address = bind.clone(),
            AppMode::Worker => config.worker.bind_address = bind.clone(),
        }
    }

    init_logging(
        &config.observability.log_level,
        LogFormat::parse(&config.observability.log_format)?,
    )?;

    info!("启动分布式作业调度系统");
    info!("运行模式: {mode_str}");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    // 阻塞HTTP客户端必须在运行时之外创建
    let app = Arc::new(Application::build(config, mode)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("scheduler-rt")
        .build()
        .context("创建异步运行时失败")?;

    if let Some(address) = &app.config().observability.metrics_bind_address {
        let _guard = runtime.enter();
        init_metrics(&runtime, address)?;
    }

    app.start()?;

    let shutdown_manager = ShutdownManager::new();
    let result = runtime.block_on(serve(Arc::clone(&app), shutdown_manager));

    app.stop();
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    drop(app);

    info!("分布式作业调度系统已退出");
    result
}

async fn serve(app: Arc<Application>, shutdown_manager: ShutdownManager) -> Result<()> {
    let listener = TcpListener::bind(app.bind_address())
        .await
        .with_context(|| format!("绑定监听地址失败: {}", app.bind_address()))?;

    let server = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown_manager.subscribe();
        tokio::spawn(async move { app.run(listener, shutdown_rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => info!("服务已优雅关闭"),
        Ok(Ok(Err(e))) => error!("服务运行失败: {e:#}"),
        Ok(Err(e)) => error!("服务任务异常结束: {e}"),
        Err(_) => warn!("等待中的请求未在 {:?} 内结束，强制退出", GRACEFUL_SHUTDOWN_TIMEOUT),
    }
    Ok(())
}

/// 安装Prometheus指标导出
fn init_metrics(runtime: &tokio::runtime::Runtime, address: &str) -> Result<()> {
    let address: SocketAddr = address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {address}"))?;
    let (recorder, exporter) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(address)
        .build()
        .map_err(|e| anyhow::anyhow!("创建Prometheus导出器失败: {e}"))?;
    metrics::set_global_recorder(recorder)
        .map_err(|e| anyhow::anyhow!("安装指标记录器失败: {e}"))?;

    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            error!("Prometheus导出器异常退出: {e:?}");
        }
    });
    info!("Prometheus指标导出于 {address}");
    Ok(())
}

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use scheduler_api::{
    create_dispatcher_app, create_worker_app, DispatcherHttpClient, WorkerHttpClient,
};
use scheduler_config::AppConfig;
use scheduler_core::traits::{WorkerClient, WorkerCoordinator};
use scheduler_dispatcher::{DecisionMaker, Dispatcher, StatusChecker, StatusCheckerConfig};
use scheduler_worker::WorkerService;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 运行Dispatcher（含状态检查与调度决策）
    Dispatcher,
    /// 运行一个Worker
    Worker,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "dispatcher" => Ok(AppMode::Dispatcher),
            "worker" => Ok(AppMode::Worker),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {mode}")),
        }
    }
}

enum Node {
    Dispatcher {
        dispatcher: Arc<Dispatcher>,
    },
    Worker {
        worker: Arc<WorkerService>,
        // Worker只持有它的弱引用
        _coordinator: Arc<DispatcherHttpClient>,
    },
}

/// 主应用程序
///
/// 组件内部使用阻塞HTTP客户端，`build` 必须在异步运行时之外调用，
/// 应用实例也应在运行时关闭之后再销毁。
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    node: Node,
}

impl Application {
    /// 按运行模式构建组件
    pub fn build(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);
        let node = match mode {
            AppMode::Dispatcher => Node::Dispatcher {
                dispatcher: build_dispatcher(&config)?,
            },
            AppMode::Worker => {
                let coordinator = Arc::new(
                    DispatcherHttpClient::new(&config.worker.dispatcher_url)
                        .context("创建Dispatcher客户端失败")?,
                );
                let weak: Weak<dyn WorkerCoordinator> =
                    Arc::downgrade(&coordinator) as Weak<dyn WorkerCoordinator>;
                let worker = WorkerService::builder(config.worker.worker_id.clone())
                    .with_default_executors()
                    .coordinator(weak)
                    .build();
                Node::Worker {
                    worker,
                    _coordinator: coordinator,
                }
            }
        };
        Ok(Self { config, mode, node })
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bind_address(&self) -> &str {
        match self.mode {
            AppMode::Dispatcher => &self.config.dispatcher.bind_address,
            AppMode::Worker => &self.config.worker.bind_address,
        }
    }

    pub fn dispatcher(&self) -> Option<&Arc<Dispatcher>> {
        match &self.node {
            Node::Dispatcher { dispatcher } => Some(dispatcher),
            Node::Worker { .. } => None,
        }
    }

    pub fn worker(&self) -> Option<&Arc<WorkerService>> {
        match &self.node {
            Node::Worker { worker, .. } => Some(worker),
            Node::Dispatcher { .. } => None,
        }
    }

    pub fn router(&self) -> Router {
        match &self.node {
            Node::Dispatcher { dispatcher } => create_dispatcher_app(Arc::clone(dispatcher)),
            Node::Worker { worker, .. } => create_worker_app(Arc::clone(worker)),
        }
    }

    /// 启动后台组件（Dispatcher的周期状态检查）
    pub fn start(&self) -> Result<()> {
        if let Node::Dispatcher { dispatcher } = &self.node {
            dispatcher.start().context("启动状态检查器失败")?;
        }
        Ok(())
    }

    /// 在给定监听器上提供服务，直到收到关闭信号
    pub async fn run(
        &self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let local_addr = listener.local_addr().context("读取监听地址失败")?;
        info!("{:?} 服务监听于 {}", self.mode, local_addr);

        if let Node::Worker { worker, .. } = &self.node {
            // 启动即向Dispatcher报告空闲，Dispatcher未就绪时等待其周期探测
            let worker = Arc::clone(worker);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = worker.pull_work() {
                    warn!("Worker首次报告空闲失败: {}", e);
                }
            });
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("HTTP服务异常退出")?;

        info!("{:?} 服务已停止接收请求", self.mode);
        Ok(())
    }

    /// 停止后台组件并取消正在执行的任务
    pub fn stop(&self) {
        match &self.node {
            Node::Dispatcher { dispatcher } => dispatcher.stop(),
            Node::Worker { worker, .. } => {
                if worker.cancel_current() {
                    info!("已取消正在执行的任务");
                }
            }
        }
    }
}

fn build_dispatcher(config: &AppConfig) -> Result<Arc<Dispatcher>> {
    let probe_timeout = Duration::from_millis(config.status_checker.probe_timeout_ms);
    let mut workers: Vec<Arc<dyn WorkerClient>> = Vec::with_capacity(config.workers.len());
    for endpoint in &config.workers {
        let client = WorkerHttpClient::new(endpoint.id.clone(), &endpoint.address, probe_timeout)
            .with_context(|| format!("创建Worker {} 的客户端失败", endpoint.id))?;
        workers.push(Arc::new(client));
    }
    info!("已配置 {} 个Worker", workers.len());

    let status_checker = Arc::new(StatusChecker::new(
        workers,
        StatusCheckerConfig {
            check_interval: Duration::from_secs(config.status_checker.check_interval_seconds),
        },
    ));
    let decision_maker = DecisionMaker::from_name(&config.dispatcher.algorithm)
        .with_context(|| format!("未知的调度算法: {}", config.dispatcher.algorithm))?;
    Ok(Dispatcher::new(decision_maker, status_checker))
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scheduler_api::{DispatcherHttpClient, WorkerHttpClient};
use scheduler_config::AppConfig;
use scheduler_core::{
    init_logging, traits::JobService, Job, LogFormat, Rescheduler, ThreadPool, WorkerClient,
};
use scheduler_dispatcher::JobRunner;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CLI应用程序主结构
#[derive(Parser, Debug)]
#[command(name = "scheduler-cli")]
#[command(version = "1.0.0")]
#[command(about = "分布式作业调度系统 - 命令行客户端")]
#[command(long_about = "提交并执行作业，查看作业、Worker与调度表状态")]
struct CliApp {
    #[command(subcommand)]
    command: Commands,

    /// Dispatcher地址，覆盖配置文件
    #[arg(long)]
    dispatcher_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 提交作业文件并执行到全部任务完成
    Submit {
        /// JSON作业文件：作业数组或 {"jobs": [...]}
        file: PathBuf,
        /// 客户端ID，设置后作业事件会投递到该客户端的消息队列
        #[arg(long)]
        client_id: Option<String>,
    },
    /// 列出未完成的作业
    Jobs,
    /// 查看作业详情
    Job {
        /// 作业ID
        job_id: String,
    },
    /// 查看Worker状态
    Workers,
    /// 查看当前调度表
    Schedule,
    /// 立即重新收集Worker状态
    Recollect,
    /// 立即重新计算调度表
    Reschedule,
    /// 读取客户端消息
    Messages {
        /// 客户端ID
        client_id: String,
        /// 最长等待时间（毫秒）
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobFile {
    Wrapped { jobs: Vec<Job> },
    Bare(Vec<Job>),
}

impl JobFile {
    fn into_jobs(self) -> Vec<Job> {
        match self {
            JobFile::Wrapped { jobs } | JobFile::Bare(jobs) => jobs,
        }
    }
}

#[derive(Serialize)]
struct JobOutcome {
    job_id: String,
    results: Vec<scheduler_core::TaskResult>,
}

fn main() -> Result<()> {
    let cli = CliApp::parse();
    init_logging(&cli.log_level, LogFormat::Pretty)?;
    cli.run()
}

impl CliApp {
    fn run(self) -> Result<()> {
        let mut config = AppConfig::load(self.config.as_deref()).context("加载配置失败")?;
        if let Some(url) = self.dispatcher_url {
            config.client.dispatcher_url = url;
        }
        let dispatcher = Arc::new(
            DispatcherHttpClient::new(&config.client.dispatcher_url)
                .context("创建Dispatcher客户端失败")?,
        );

        match self.command {
            Commands::Submit { file, client_id } => {
                submit(&config, dispatcher, &file, client_id.as_deref())
            }
            Commands::Jobs => print_json(&dispatcher.jobs().context("获取作业列表失败")?),
            Commands::Job { job_id } => {
                print_json(&dispatcher.job(&job_id).context("获取作业详情失败")?)
            }
            Commands::Workers => {
                print_json(&dispatcher.worker_statuses().context("获取Worker状态失败")?)
            }
            Commands::Schedule => print_json(&dispatcher.schedule().context("获取调度表失败")?),
            Commands::Recollect => print_json(
                &dispatcher
                    .recollect_status()
                    .context("重新收集Worker状态失败")?,
            ),
            Commands::Reschedule => {
                dispatcher.reschedule().context("重新调度失败")?;
                println!("已重新计算调度表");
                Ok(())
            }
            Commands::Messages {
                client_id,
                timeout_ms,
            } => {
                let messages = dispatcher
                    .get_messages(&client_id, Duration::from_millis(timeout_ms))
                    .context("读取客户端消息失败")?;
                print_json(&messages)
            }
        }
    }
}

fn submit(
    config: &AppConfig,
    dispatcher: Arc<DispatcherHttpClient>,
    file: &Path,
    client_id: Option<&str>,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("读取作业文件失败: {}", file.display()))?;
    let job_file: JobFile = serde_json::from_str(&content).context("解析作业文件失败")?;
    let mut jobs = job_file.into_jobs();
    if jobs.is_empty() {
        println!("作业文件中没有作业");
        return Ok(());
    }

    if let Some(client_id) = client_id {
        dispatcher
            .register_client(client_id)
            .context("注册客户端失败")?;
        jobs = jobs
            .into_iter()
            .map(|job| job.with_client(client_id))
            .collect();
    }

    let probe_timeout = Duration::from_millis(config.status_checker.probe_timeout_ms);
    let mut workers: Vec<Arc<dyn WorkerClient>> = Vec::with_capacity(config.workers.len());
    for endpoint in &config.workers {
        let client = WorkerHttpClient::new(endpoint.id.clone(), &endpoint.address, probe_timeout)
            .with_context(|| format!("创建Worker {} 的客户端失败", endpoint.id))?;
        workers.push(Arc::new(client));
    }

    let pool = Arc::new(ThreadPool::new(config.client.thread_pool_size)?);
    let runner = JobRunner::new(dispatcher, workers, Arc::clone(&pool));
    println!("提交 {} 个作业...", jobs.len());
    let outcomes: Vec<JobOutcome> = runner
        .submit_and_run(jobs)
        .context("执行作业失败")?
        .into_iter()
        .map(|(job_id, results)| JobOutcome { job_id, results })
        .collect();
    pool.shutdown();

    print_json(&outcomes)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let value: Value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_file_accepts_both_layouts() {
        let job = r#"{"priority":1,"deadline":"2030-01-01T00:00:00Z","tasks":[{"spec":{"kind":"delay","seconds":0.1}}]}"#;
        let bare: JobFile = serde_json::from_str(&format!("[{job}]")).unwrap();
        let wrapped: JobFile = serde_json::from_str(&format!(r#"{{"jobs":[{job},{job}]}}"#)).unwrap();
        assert_eq!(bare.into_jobs().len(), 1);
        assert_eq!(wrapped.into_jobs().len(), 2);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = CliApp::try_parse_from([
            "scheduler-cli",
            "--dispatcher-url",
            "http://127.0.0.1:9000",
            "messages",
            "client-1",
            "--timeout-ms",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.dispatcher_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(matches!(
            cli.command,
            Commands::Messages { ref client_id, timeout_ms: 50 } if client_id == "client-1"
        ));
    }
}

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use scheduler_core::{
    models::{Task, TaskResult, TaskSpec},
    traits::{CancellationFlag, TaskExecutor},
    SchedulerError, SchedulerResult,
};
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn unsupported(executor: &str, spec: &TaskSpec) -> SchedulerError {
    SchedulerError::TaskExecution(format!(
        "执行器 {executor} 不支持任务类型 {}",
        spec.kind()
    ))
}

fn result_for(task: &Task, started: Instant) -> TaskResult {
    TaskResult {
        task_id: task.id.unwrap_or_default(),
        job_id: task.job_id.clone().unwrap_or_default(),
        duration_seconds: started.elapsed().as_secs_f64(),
        exit_code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

/// 外部命令执行器
///
/// 捕获stdout/stderr和退出码。取消标记被置位时杀死子进程并返回
/// [`SchedulerError::Cancelled`]。
pub struct ShellExecutor {
    poll_interval: Duration,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// 检查进程是否结束及取消标记的间隔
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<String> {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Some(mut source) = source {
                if let Err(e) = source.read_to_end(&mut buffer) {
                    debug!("读取子进程输出失败: {}", e);
                }
            }
            String::from_utf8_lossy(&buffer).trim_end().to_string()
        })
    }

    fn collect(reader: JoinHandle<String>) -> String {
        reader.join().unwrap_or_default()
    }

    fn kill(child: &mut Child) {
        if let Err(e) = child.kill() {
            warn!("终止子进程失败: {}", e);
        }
        if let Err(e) = child.wait() {
            warn!("回收子进程失败: {}", e);
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "command"
    }

    fn execute(&self, task: &Task, cancel: &CancellationFlag) -> SchedulerResult<TaskResult> {
        let TaskSpec::Command { program, args } = &task.spec else {
            return Err(unsupported(self.name(), &task.spec));
        };
        let started = Instant::now();
        info!(
            "执行命令任务: job_id={:?}, task_id={:?}, command={}, args={:?}",
            task.job_id, task.id, program, args
        );

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SchedulerError::TaskExecution(format!("启动命令 {program} 失败: {e}")))?;

        let stdout = Self::spawn_reader(child.stdout.take());
        let stderr = Self::spawn_reader(child.stderr.take());

        let status = loop {
            if cancel.is_cancelled() {
                warn!("任务被取消，终止子进程: job_id={:?}, task_id={:?}", task.job_id, task.id);
                Self::kill(&mut child);
                Self::collect(stdout);
                Self::collect(stderr);
                return Err(SchedulerError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    Self::kill(&mut child);
                    return Err(SchedulerError::TaskExecution(format!("等待进程结束失败: {e}")));
                }
            }
        };

        let mut result = result_for(task, started);
        result.exit_code = status.code();
        result.stdout = Self::collect(stdout);
        result.stderr = Self::collect(stderr);
        if result.stderr.is_empty() && !status.success() {
            result.stderr = format!("命令执行失败，退出状态: {status}");
        }

        info!(
            "命令任务执行完成: job_id={}, task_id={}, exit_code={:?}, duration={:.3}s",
            result.job_id, result.task_id, result.exit_code, result.duration_seconds
        );
        Ok(result)
    }
}

/// 合成负载：等待指定秒数
pub struct DelayExecutor {
    poll_interval: Duration,
}

impl DelayExecutor {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for DelayExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor for DelayExecutor {
    fn name(&self) -> &str {
        "delay"
    }

    fn execute(&self, task: &Task, cancel: &CancellationFlag) -> SchedulerResult<TaskResult> {
        let TaskSpec::Delay { seconds } = &task.spec else {
            return Err(unsupported(self.name(), &task.spec));
        };
        let delay = Duration::try_from_secs_f64(*seconds)
            .map_err(|e| SchedulerError::TaskExecution(format!("无效的延时 {seconds}: {e}")))?;

        let started = Instant::now();
        let deadline = started + delay;
        loop {
            if cancel.is_cancelled() {
                return Err(SchedulerError::Cancelled);
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(self.poll_interval));
        }

        debug!("延时任务完成: {:.3}s", seconds);
        Ok(result_for(task, started))
    }
}

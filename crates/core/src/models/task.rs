use serde::{Deserialize, Serialize};

use super::JobId;

/// 任务的执行内容
///
/// - `Command`: 外部命令及其参数
/// - `Delay`: 合成负载，仅等待指定秒数（用于实验和测试）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    Command { program: String, args: Vec<String> },
    Delay { seconds: f64 },
}

impl TaskSpec {
    /// 执行器按此名称选择
    pub fn kind(&self) -> &'static str {
        match self {
            TaskSpec::Command { .. } => "command",
            TaskSpec::Delay { .. } => "delay",
        }
    }
}

/// 任务定义
///
/// 作业中的一个可独立执行的单元。创建后只有 `id`（作业内下标）
/// 和 `job_id` 会在作业提交时被填入。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<usize>,
    pub job_id: Option<JobId>,
    pub spec: TaskSpec,
}

impl Task {
    pub fn command<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            id: None,
            job_id: None,
            spec: TaskSpec::Command {
                program: program.into(),
                args,
            },
        }
    }

    pub fn delay(seconds: f64) -> Self {
        Self {
            id: None,
            job_id: None,
            spec: TaskSpec::Delay { seconds },
        }
    }
}

/// 任务执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: usize,
    pub job_id: JobId,
    /// 墙钟运行时间（秒）
    pub duration_seconds: f64,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

use serde::{Deserialize, Serialize};

pub type WorkerId = String;

/// Worker状态
///
/// ```text
/// Unknown → Available → Occupied → Busy → Available
///              任意状态 ──通信失败──→ Down ──探测成功──→ Available
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// 尚未完成首次健康探测
    Unknown,
    /// 已注册且空闲
    Available,
    /// 已被当前调度分配给某个作业，尚未开始执行
    Occupied,
    /// 正在执行任务
    Busy,
    /// 通信失败
    Down,
}

impl WorkerStatus {
    /// 调度时是否视为可用资源（只排除Down）
    pub fn is_live(&self) -> bool {
        !matches!(self, WorkerStatus::Down)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerStatus::Unknown => "UNKNOWN",
            WorkerStatus::Available => "AVAILABLE",
            WorkerStatus::Occupied => "OCCUPIED",
            WorkerStatus::Busy => "BUSY",
            WorkerStatus::Down => "DOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&WorkerStatus::Available).unwrap(),
            "\"AVAILABLE\""
        );
        let status: WorkerStatus = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(status, WorkerStatus::Down);
        assert_eq!(WorkerStatus::Occupied.to_string(), "OCCUPIED");
    }

    #[test]
    fn test_is_live() {
        assert!(WorkerStatus::Unknown.is_live());
        assert!(WorkerStatus::Busy.is_live());
        assert!(!WorkerStatus::Down.is_live());
    }
}

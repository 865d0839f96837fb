use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult};

const FIELD_BITS: u32 = 21;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

/// 作业进度快照（排队 / 已下发 / 已完成）
///
/// 值对象，创建后不可修改。任何变更都通过 [`Progress::apply`] 生成新的快照，
/// 再由 [`AtomicProgress`] 以CAS方式整体替换。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    queued: u32,
    sent: u32,
    done: u32,
}

/// 进度增量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressDelta {
    pub queued: i64,
    pub sent: i64,
    pub done: i64,
}

impl ProgressDelta {
    pub const TASK_SENT: ProgressDelta = ProgressDelta {
        queued: -1,
        sent: 1,
        done: 0,
    };
    pub const TASK_DONE: ProgressDelta = ProgressDelta {
        queued: 0,
        sent: -1,
        done: 1,
    };
    pub const TASK_REDO: ProgressDelta = ProgressDelta {
        queued: 1,
        sent: -1,
        done: 0,
    };
}

impl Progress {
    /// 单个计数允许的最大值（21位打包）
    pub const MAX_COUNT: u32 = FIELD_MASK as u32;

    pub fn new(queued: u32, sent: u32, done: u32) -> SchedulerResult<Self> {
        for (name, value) in [("queued", queued), ("sent", sent), ("done", done)] {
            if value > Self::MAX_COUNT {
                return Err(SchedulerError::ProgressInvariant(format!(
                    "{name} 计数 {value} 超过上限 {}",
                    Self::MAX_COUNT
                )));
            }
        }
        Ok(Self { queued, sent, done })
    }

    pub fn queued(&self) -> u32 {
        self.queued
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn done(&self) -> u32 {
        self.done
    }

    pub fn total(&self) -> u32 {
        self.queued + self.sent + self.done
    }

    pub fn undone(&self) -> u32 {
        self.queued + self.sent
    }

    pub fn is_finished(&self) -> bool {
        self.undone() == 0
    }

    /// 根据增量生成新的进度快照，任何计数变为负数都视为不变量被破坏
    pub fn apply(&self, delta: ProgressDelta) -> SchedulerResult<Progress> {
        let shift = |name: &str, current: u32, by: i64| -> SchedulerResult<u32> {
            let next = current as i64 + by;
            if next < 0 {
                return Err(SchedulerError::ProgressInvariant(format!(
                    "{name} 计数不足: 当前 {current}, 变更 {by}"
                )));
            }
            Ok(next as u32)
        };
        Progress::new(
            shift("queued", self.queued, delta.queued)?,
            shift("sent", self.sent, delta.sent)?,
            shift("done", self.done, delta.done)?,
        )
    }

    fn pack(self) -> u64 {
        (self.queued as u64) << (2 * FIELD_BITS) | (self.sent as u64) << FIELD_BITS | self.done as u64
    }

    fn unpack(packed: u64) -> Self {
        Self {
            queued: ((packed >> (2 * FIELD_BITS)) & FIELD_MASK) as u32,
            sent: ((packed >> FIELD_BITS) & FIELD_MASK) as u32,
            done: (packed & FIELD_MASK) as u32,
        }
    }
}

/// 进度的原子持有者
///
/// 三个计数打包进一个 `AtomicU64`，读者永远看到完整的快照，
/// 写者通过 compare-and-swap 重试，不持有任何锁。
#[derive(Debug)]
pub struct AtomicProgress {
    packed: AtomicU64,
}

impl AtomicProgress {
    pub fn new(progress: Progress) -> Self {
        Self {
            packed: AtomicU64::new(progress.pack()),
        }
    }

    pub fn load(&self) -> Progress {
        Progress::unpack(self.packed.load(Ordering::Acquire))
    }

    pub fn update(&self, delta: ProgressDelta) -> SchedulerResult<Progress> {
        let mut current = self.packed.load(Ordering::Acquire);
        loop {
            let next = Progress::unpack(current).apply(delta)?;
            match self.packed.compare_exchange_weak(
                current,
                next.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }
}

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// 阻塞队列
///
/// `pop` 在队列为空时阻塞，直到有元素被 `push`。`clear` 原地清空并
/// 返回被清出的元素，队列本身（以及阻塞在其上的消费者）保持不变。
#[derive(Debug)]
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    pub fn pop(&self) -> T {
        self.pop_with(|_| {})
    }

    /// 同 `pop`，出队后仍持有队列锁时调用 `on_pop`
    ///
    /// 对其他线程而言，元素离开队列与 `on_pop` 的效果同时可见。
    pub fn pop_with<F: FnOnce(&T)>(&self, on_pop: F) -> T {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                on_pop(&item);
                return item;
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 最多等待 `timeout`，超时返回None
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .available
                .wait_timeout(items, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            items = guard;
        }
    }

    /// 等待至少一个元素（最多 `timeout`），然后取走当前全部元素
    pub fn drain_timeout(&self, timeout: Duration) -> Vec<T> {
        match self.pop_timeout(timeout) {
            Some(first) => {
                let mut drained = vec![first];
                drained.extend(self.lock().drain(..));
                drained
            }
            None => Vec::new(),
        }
    }

    pub fn clear(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: PartialEq> BlockingQueue<T> {
    /// 移除第一个等于 `item` 的元素，返回是否找到
    pub fn remove(&self, item: &T) -> bool {
        let mut items = self.lock();
        match items.iter().position(|candidate| candidate == item) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.lock().contains(item)
    }
}

impl<T: Clone> BlockingQueue<T> {
    /// 当前元素的副本，按出队顺序
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

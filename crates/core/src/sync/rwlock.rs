use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct LockState {
    active_readers: usize,
    writer_active: bool,
    waiting_writers: usize,
}

/// 写者优先的读写锁
///
/// - 多个读者可以同时持有
/// - 写者独占，持有期间排除所有读者
/// - 一旦有写者在等待，之后到达的读者必须排在它后面，避免写者饥饿
///
/// 不可重入：同一线程持有读锁时再申请写锁会死锁，调用方不得嵌套。
/// 守卫在任何退出路径（包括panic展开）上都会释放锁，锁本身不做中毒标记。
pub struct RwLock<T> {
    state: Mutex<LockState>,
    readers: Condvar,
    writers: Condvar,
    data: UnsafeCell<T>,
}

// 对 data 的访问只通过守卫进行，守卫的存在由 state 保证互斥
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            readers: Condvar::new(),
            writers: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// 在读锁保护下执行闭包
    pub fn with_read_lock<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&guard)
    }

    /// 在写锁保护下执行闭包
    pub fn with_write_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }

    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut state = self.lock_state();
        while state.writer_active || state.waiting_writers > 0 {
            state = self
                .readers
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.active_readers += 1;
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut state = self.lock_state();
        state.waiting_writers += 1;
        while state.writer_active || state.active_readers > 0 {
            state = self
                .writers
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiting_writers -= 1;
        state.writer_active = true;
        WriteGuard { lock: self }
    }

    /// 正在等待的写者数量
    pub fn pending_writers(&self) -> usize {
        self.lock_state().waiting_writers
    }

    /// 当前持有读锁的读者数量
    pub fn active_readers(&self) -> usize {
        self.lock_state().active_readers
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_read(&self) {
        let mut state = self.lock_state();
        state.active_readers -= 1;
        if state.active_readers == 0 && state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.lock_state();
        state.writer_active = false;
        if state.waiting_writers > 0 {
            self.writers.notify_one();
        } else {
            self.readers.notify_all();
        }
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> std::fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RwLock")
            .field("active_readers", &state.active_readers)
            .field("writer_active", &state.writer_active)
            .field("waiting_writers", &state.waiting_writers)
            .finish_non_exhaustive()
    }
}

pub struct ReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

pub struct WriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

//! 并发原语
//!
//! - [`RwLock`]: 写者优先、不可重入的读写锁，保护调度表、状态表和作业注册表
//! - [`ThreadPool`]: 固定大小线程池，客户端用它并行驱动任务执行
//! - [`BlockingQueue`]: 阻塞队列，用作每个作业的Worker队列和客户端邮箱

pub mod blocking_queue;
pub mod rwlock;
pub mod thread_pool;

pub use blocking_queue::BlockingQueue;
pub use rwlock::{ReadGuard, RwLock, WriteGuard};
pub use thread_pool::{ThreadPool, WorkHandle};

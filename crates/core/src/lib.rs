pub mod errors;
pub mod logging;
pub mod models;
pub mod sync;
pub mod traits;

pub use errors::{SchedulerError, SchedulerResult};
pub use logging::{init_logging, LogFormat};
pub use models::{
    Assignment, ClientId, ClientMessage, Job, JobId, Progress, ScheduleTables, SchedulingContext,
    Task, TaskResult, TaskSpec, WorkerId, WorkerStatus,
};
pub use sync::{BlockingQueue, RwLock, ThreadPool, WorkHandle};
pub use traits::{
    CancellationFlag, JobService, Rescheduler, SchedulingAlgorithm, TaskExecutor, WorkerClient,
    WorkerCoordinator,
};

pub mod dispatcher;
pub mod scheduler;
pub mod task_executor;
pub mod worker;

pub use dispatcher::*;
pub use scheduler::*;
pub use task_executor::*;
pub use worker::*;

pub mod executors;
pub mod service;

#[cfg(test)]
mod service_test;


pub use executors::{DelayExecutor, ShellExecutor};
pub use service::{WorkerService, WorkerServiceBuilder, WorkerSnapshot};

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use scheduler_dispatcher::Dispatcher;
use scheduler_worker::WorkerService;

use crate::handlers::{
    clients::{get_messages, push_message, register_client, unregister_client},
    health::health_check,
    jobs::{
        get_job, job_done, list_jobs, require_worker, return_worker, submit_jobs, task_done,
        task_redo, task_sent,
    },
    root::{dispatcher_root, fallback, worker_root},
    worker_node,
    workers::{
        check_assignment, get_schedule, list_workers, recollect_status, reschedule,
        worker_available,
    },
};

/// Dispatcher服务的路由状态
#[derive(Clone)]
pub struct DispatcherState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Worker服务的路由状态
#[derive(Clone)]
pub struct WorkerNodeState {
    pub worker: Arc<WorkerService>,
}

/// 创建Dispatcher路由
pub fn create_dispatcher_routes(state: DispatcherState) -> Router {
    Router::new()
        .route("/", get(dispatcher_root))
        .route("/health", get(health_check))
        // 作业管理与任务进度
        .route("/api/v1/jobs", get(list_jobs).post(submit_jobs))
        .route("/api/v1/jobs/{id}", get(get_job))
        .route("/api/v1/jobs/{id}/worker", post(require_worker))
        .route("/api/v1/jobs/{id}/tasks/sent", post(task_sent))
        .route("/api/v1/jobs/{id}/tasks/done", post(task_done))
        .route("/api/v1/jobs/{id}/tasks/redo", post(task_redo))
        .route("/api/v1/jobs/{id}/done", post(job_done))
        .route(
            "/api/v1/jobs/{id}/workers/{worker_id}/return",
            post(return_worker),
        )
        // Worker协调
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/recollect", post(recollect_status))
        .route("/api/v1/workers/{id}/available", post(worker_available))
        .route(
            "/api/v1/workers/{id}/assignment/{job_id}",
            get(check_assignment),
        )
        // 调度表
        .route("/api/v1/schedule", get(get_schedule))
        .route("/api/v1/schedule/reschedule", post(reschedule))
        // 客户端邮箱
        .route(
            "/api/v1/clients/{id}",
            post(register_client).delete(unregister_client),
        )
        .route(
            "/api/v1/clients/{id}/messages",
            get(get_messages).post(push_message),
        )
        .fallback(fallback)
        .with_state(state)
}

/// 创建Worker路由
pub fn create_worker_routes(state: WorkerNodeState) -> Router {
    Router::new()
        .route("/", get(worker_root))
        .route("/health", get(health_check))
        .route("/api/v1/worker/info", get(worker_node::info))
        .route("/api/v1/worker/status", get(worker_node::status))
        .route("/api/v1/worker/average", get(worker_node::average_running_time))
        .route("/api/v1/worker/occupied-for", get(worker_node::occupied_for))
        .route("/api/v1/worker/occupy", post(worker_node::occupy))
        .route("/api/v1/worker/release", post(worker_node::release))
        .route("/api/v1/worker/validate", post(worker_node::validate_occupation))
        .route("/api/v1/worker/pull", post(worker_node::pull_work))
        .route("/api/v1/worker/run", post(worker_node::run_task))
        .route("/api/v1/worker/cancel", post(worker_node::cancel))
        .fallback(fallback)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use scheduler_core::models::{Task, WorkerStatus};
    use scheduler_core::traits::WorkerClient;
    use scheduler_worker::{WorkerService, WorkerSnapshot};

    #[test]
    fn test_worker_lifecycle_without_dispatcher() {
        let worker = WorkerService::builder("worker-007")
            .with_default_executors()
            .build();

        assert!(worker.occupy("job-1").unwrap());
        assert_eq!(worker.status().unwrap(), WorkerStatus::Occupied);

        let mut task = Task::delay(0.01);
        task.id = Some(4);
        task.job_id = Some("job-1".to_string());
        let result = worker.run_task(&task).unwrap();
        assert_eq!(result.task_id, 4);
        assert_eq!(result.job_id, "job-1");

        // 没有Dispatcher时拉取工作是空操作
        assert_eq!(worker.status().unwrap(), WorkerStatus::Available);
        worker.pull_work().unwrap();
    }

    #[test]
    fn test_worker_snapshot_serialization() {
        let worker = WorkerService::builder("worker-007")
            .with_default_executors()
            .build();
        worker.run_task(&Task::delay(0.0)).unwrap();

        let json = serde_json::to_value(worker.snapshot()).unwrap();
        assert_eq!(json["worker_id"], "worker-007");
        assert_eq!(json["status"], "AVAILABLE");
        assert_eq!(json["tasks_completed"], 1);

        let parsed: WorkerSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.supported_task_types, vec!["command", "delay"]);
    }
}

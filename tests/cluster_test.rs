#[cfg(test)]
mod tests {
    use std::net::TcpListener as StdTcpListener;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use grid_scheduler::{AppMode, Application, ShutdownManager};
    use scheduler_api::{DispatcherHttpClient, WorkerHttpClient};
    use scheduler_config::{AppConfig, WorkerEndpoint};
    use scheduler_core::{ClientMessage, Job, JobService, Task, ThreadPool, WorkerClient};
    use scheduler_dispatcher::JobRunner;
    use tempfile::TempDir;
    use tokio::runtime::Runtime;

    /// 在同一进程内运行的一个Dispatcher和一个Worker
    struct Cluster {
        runtime: Option<Runtime>,
        shutdown: ShutdownManager,
        dispatcher: Arc<Application>,
        worker: Arc<Application>,
        config: AppConfig,
    }

    impl Cluster {
        fn start(algorithm: &str) -> Self {
            let dispatcher_listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
            let worker_listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
            let dispatcher_addr = dispatcher_listener.local_addr().unwrap();
            let worker_addr = worker_listener.local_addr().unwrap();

            let mut config = AppConfig::default();
            config.dispatcher.algorithm = algorithm.to_string();
            config.dispatcher.bind_address = dispatcher_addr.to_string();
            config.status_checker.check_interval_seconds = 1;
            config.status_checker.probe_timeout_ms = 500;
            config.workers = vec![WorkerEndpoint {
                id: "w1".to_string(),
                address: format!("http://{worker_addr}"),
            }];
            config.worker.worker_id = "w1".to_string();
            config.worker.bind_address = worker_addr.to_string();
            config.worker.dispatcher_url = format!("http://{dispatcher_addr}");
            config.client.dispatcher_url = format!("http://{dispatcher_addr}");

            let dispatcher =
                Arc::new(Application::build(config.clone(), AppMode::Dispatcher).unwrap());
            let worker = Arc::new(Application::build(config.clone(), AppMode::Worker).unwrap());

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            let shutdown = ShutdownManager::new();
            for (app, listener) in [
                (Arc::clone(&dispatcher), dispatcher_listener),
                (Arc::clone(&worker), worker_listener),
            ] {
                listener.set_nonblocking(true).unwrap();
                let shutdown_rx = shutdown.subscribe();
                runtime.spawn(async move {
                    let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                    app.run(listener, shutdown_rx).await
                });
            }
            dispatcher.start().unwrap();

            Self {
                runtime: Some(runtime),
                shutdown,
                dispatcher,
                worker,
                config,
            }
        }

        fn dispatcher_client(&self) -> Arc<DispatcherHttpClient> {
            Arc::new(DispatcherHttpClient::new(&self.config.client.dispatcher_url).unwrap())
        }

        fn worker_clients(&self) -> Vec<Arc<dyn WorkerClient>> {
            self.config
                .workers
                .iter()
                .map(|endpoint| {
                    Arc::new(
                        WorkerHttpClient::new(
                            endpoint.id.clone(),
                            &endpoint.address,
                            Duration::from_millis(500),
                        )
                        .unwrap(),
                    ) as Arc<dyn WorkerClient>
                })
                .collect()
        }
    }

    impl Drop for Cluster {
        fn drop(&mut self) {
            self.shutdown.shutdown();
            self.dispatcher.stop();
            self.worker.stop();
            if let Some(runtime) = self.runtime.take() {
                runtime.shutdown_timeout(Duration::from_secs(5));
            }
        }
    }

    fn delay_job(priority: i64, tasks: usize) -> Job {
        Job::new(
            priority,
            Utc::now() + chrono::Duration::seconds(60),
            (0..tasks).map(|_| Task::delay(0.05)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_jobs_run_to_completion_over_http() {
        let cluster = Cluster::start("preemptive_deadline");
        let pool = Arc::new(ThreadPool::new(4).unwrap());
        let runner = JobRunner::new(
            cluster.dispatcher_client(),
            cluster.worker_clients(),
            Arc::clone(&pool),
        );

        let outcomes = runner
            .submit_and_run(vec![delay_job(1, 3), delay_job(2, 2)])
            .unwrap();
        pool.shutdown();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].1.len(), 3);
        assert_eq!(outcomes[1].1.len(), 2);
        for (job_id, results) in &outcomes {
            for (index, result) in results.iter().enumerate() {
                assert!(result.is_success());
                assert_eq!(result.task_id, index);
                assert_eq!(&result.job_id, job_id);
            }
        }

        let dispatcher = cluster.dispatcher.dispatcher().unwrap();
        assert!(dispatcher.job_ids().is_empty());
        let worker = cluster.worker.worker().unwrap();
        assert_eq!(worker.snapshot().tasks_completed, 5);
    }

    #[test]
    fn test_client_receives_job_events() {
        let cluster = Cluster::start("edf");
        let client = cluster.dispatcher_client();
        client.register_client("client-1").unwrap();

        let pool = Arc::new(ThreadPool::new(2).unwrap());
        let runner = JobRunner::new(
            Arc::clone(&client) as Arc<dyn JobService>,
            cluster.worker_clients(),
            Arc::clone(&pool),
        );
        let outcomes = runner
            .submit_and_run(vec![delay_job(1, 1).with_client("client-1")])
            .unwrap();
        pool.shutdown();
        let job_id = outcomes[0].0.clone();

        let messages = client
            .get_messages("client-1", Duration::from_millis(500))
            .unwrap();
        assert!(messages.contains(&ClientMessage::JobSubmitted {
            job_id: job_id.clone()
        }));
        assert!(messages.contains(&ClientMessage::JobCompleted { job_id }));
        client.unregister_client("client-1").unwrap();
    }

    #[test]
    fn test_application_from_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scheduler.toml");

        let mut config = AppConfig::default();
        config.dispatcher.algorithm = "priority".to_string();
        config.workers.push(WorkerEndpoint {
            id: "w9".to_string(),
            address: "http://127.0.0.1:9109".to_string(),
        });
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = AppConfig::load(path.to_str()).unwrap();
        let app = Application::build(loaded, AppMode::Dispatcher).unwrap();
        let dispatcher = app.dispatcher().unwrap();
        assert_eq!(dispatcher.algorithm_name(), "priority");
        assert_eq!(dispatcher.status_checker().worker_ids(), vec!["w9"]);
    }
}

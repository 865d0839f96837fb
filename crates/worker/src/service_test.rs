use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex, Weak};
use std::thread;
use std::time::Duration;

use scheduler_core::models::{Task, WorkerStatus};
use scheduler_core::traits::{WorkerClient, WorkerCoordinator};
use scheduler_core::{SchedulerError, SchedulerResult};

use crate::WorkerService;

/// 记录Worker回调的协调方
#[derive(Default)]
struct RecordingCoordinator {
    available: Mutex<Vec<String>>,
    assignment_valid: AtomicBool,
}

impl WorkerCoordinator for RecordingCoordinator {
    fn on_worker_available(&self, worker_id: &str) -> SchedulerResult<()> {
        self.available.lock().unwrap().push(worker_id.to_string());
        Ok(())
    }

    fn check_assignment(&self, _worker_id: &str, _job_id: &str) -> SchedulerResult<bool> {
        Ok(self.assignment_valid.load(Ordering::SeqCst))
    }
}

fn service_with_coordinator() -> (Arc<WorkerService>, Arc<RecordingCoordinator>) {
    let coordinator = Arc::new(RecordingCoordinator::default());
    let weak: Weak<dyn WorkerCoordinator> =
        Arc::downgrade(&coordinator) as Weak<dyn WorkerCoordinator>;
    let service = WorkerService::builder("worker-1")
        .with_default_executors()
        .coordinator(weak)
        .build();
    (service, coordinator)
}

#[test]
fn test_worker_service_creation() {
    let service = WorkerService::builder("worker-1").with_default_executors().build();
    assert_eq!(service.id(), "worker-1");
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);
    assert_eq!(service.average_running_time().unwrap(), None);
    assert_eq!(service.supported_task_types(), vec!["command", "delay"]);
}

#[test]
fn test_occupy_only_from_available() {
    let (service, _) = service_with_coordinator();
    assert!(service.occupy("job-a").unwrap());
    assert!(!service.occupy("job-b").unwrap());
    assert_eq!(service.occupied_for().unwrap().as_deref(), Some("job-a"));

    service.release().unwrap();
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);
    assert!(service.occupy("job-b").unwrap());
}

#[test]
fn test_concurrent_occupy_single_winner() {
    let (service, _) = service_with_coordinator();
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.occupy(&format!("job-{i}")).unwrap()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_run_task_updates_average_and_pulls_work() {
    let (service, coordinator) = service_with_coordinator();
    assert!(service.occupy("job-a").unwrap());

    let result = service.run_task(&Task::delay(0.02)).unwrap();
    assert!(result.is_success());
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);
    assert_eq!(service.occupied_for().unwrap(), None);
    assert_eq!(*coordinator.available.lock().unwrap(), vec!["worker-1"]);

    let average = service.average_running_time().unwrap().unwrap();
    assert!(average >= 0.02);

    service.run_task(&Task::delay(0.0)).unwrap();
    let snapshot = service.snapshot();
    assert_eq!(snapshot.tasks_completed, 2);
    assert!(snapshot.average_running_time.unwrap() < average);
}

#[test]
fn test_validate_occupation_releases_stale_assignment() {
    let (service, coordinator) = service_with_coordinator();
    coordinator.assignment_valid.store(true, Ordering::SeqCst);
    assert!(service.occupy("job-a").unwrap());
    assert!(service.validate_occupation().unwrap());
    assert_eq!(service.status().unwrap(), WorkerStatus::Occupied);

    coordinator.assignment_valid.store(false, Ordering::SeqCst);
    assert!(!service.validate_occupation().unwrap());
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);

    // 空闲Worker没有可校验的占用
    assert!(!service.validate_occupation().unwrap());
}

#[test]
fn test_pull_work_only_when_available() {
    let (service, coordinator) = service_with_coordinator();
    service.occupy("job-a").unwrap();
    service.pull_work().unwrap();
    assert!(coordinator.available.lock().unwrap().is_empty());

    service.release().unwrap();
    service.pull_work().unwrap();
    assert_eq!(coordinator.available.lock().unwrap().len(), 1);
}

#[test]
fn test_cancel_running_task() {
    let (service, _) = service_with_coordinator();
    let runner = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.run_task(&Task::delay(30.0)))
    };

    let mut cancelled = false;
    for _ in 0..200 {
        if service.cancel_current() {
            cancelled = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(cancelled);
    assert!(matches!(runner.join().unwrap(), Err(SchedulerError::Cancelled)));
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);
    assert_eq!(service.average_running_time().unwrap(), None);
}

#[test]
fn test_unknown_task_type_rejected() {
    let service = WorkerService::builder("worker-1").build();
    assert!(matches!(
        service.run_task(&Task::delay(0.0)),
        Err(SchedulerError::TaskExecution(_))
    ));
    assert_eq!(service.status().unwrap(), WorkerStatus::Available);
}

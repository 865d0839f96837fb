use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

use scheduler_core::{
    models::{Job, JobId, TaskResult, WorkerId},
    sync::{ThreadPool, WorkHandle},
    traits::{JobService, WorkerClient},
    SchedulerError, SchedulerResult,
};

struct TaskOutcome {
    index: usize,
    worker_id: WorkerId,
    elapsed: f64,
    result: SchedulerResult<TaskResult>,
}

/// 客户端作业执行器
///
/// 对每个排队任务：向Dispatcher申请Worker，上报下发，在线程池上远程执行，
/// 再上报完成。执行时网络失败的任务会重做并重新排队；其他失败记为一次
/// 失败的执行结果。所有任务结束后上报作业完成。
pub struct JobRunner {
    service: Arc<dyn JobService>,
    workers: HashMap<WorkerId, Arc<dyn WorkerClient>>,
    pool: Arc<ThreadPool>,
}

impl JobRunner {
    pub fn new(
        service: Arc<dyn JobService>,
        workers: Vec<Arc<dyn WorkerClient>>,
        pool: Arc<ThreadPool>,
    ) -> Self {
        let workers = workers
            .into_iter()
            .map(|worker| (worker.id().to_string(), worker))
            .collect();
        Self {
            service,
            workers,
            pool,
        }
    }

    /// 提交一批作业并并发执行，返回 (作业ID, 按任务下标排列的结果)
    pub fn submit_and_run(&self, jobs: Vec<Job>) -> SchedulerResult<Vec<(JobId, Vec<TaskResult>)>> {
        let mut local = jobs.clone();
        let ids = self.service.submit_jobs(jobs)?;
        for (job, id) in local.iter_mut().zip(&ids) {
            job.assign_id(id.clone());
        }

        thread::scope(|scope| {
            let runs: Vec<_> = local
                .iter()
                .map(|job| scope.spawn(move || self.run(job)))
                .collect();
            ids.iter()
                .zip(runs)
                .map(|(id, run)| {
                    let results = run.join().map_err(|_| {
                        SchedulerError::Internal(format!("作业 {id} 的执行线程panic"))
                    })??;
                    Ok((id.clone(), results))
                })
                .collect()
        })
    }

    /// 执行一个已提交的作业直到全部任务完成
    pub fn run(&self, job: &Job) -> SchedulerResult<Vec<TaskResult>> {
        let job_id = job
            .id
            .clone()
            .ok_or_else(|| SchedulerError::InvalidMessage("作业尚未分配ID".to_string()))?;
        let total = job.tasks.len();
        info!("开始执行作业 {}，任务数 {}", job_id, total);

        let mut pending: VecDeque<usize> = (0..total).collect();
        let mut results: Vec<Option<TaskResult>> = vec![None; total];
        let mut handles: Vec<WorkHandle> = Vec::new();
        let mut completed = 0usize;
        let mut in_flight = 0usize;
        let (sender, receiver) = channel::unbounded::<TaskOutcome>();

        while completed < total {
            // 先处理已结束的任务，网络失败的任务可能需要重新排队
            while let Ok(outcome) = receiver.try_recv() {
                in_flight -= 1;
                completed += self.settle(&job_id, outcome, &mut pending, &mut results)?;
            }
            if completed == total {
                break;
            }

            match pending.pop_front() {
                Some(index) => {
                    let handle = self.dispatch(&job_id, job, index, &sender)?;
                    handles.push(handle);
                    in_flight += 1;
                }
                None if in_flight > 0 => {
                    let outcome = Self::wait(&receiver)?;
                    in_flight -= 1;
                    completed += self.settle(&job_id, outcome, &mut pending, &mut results)?;
                }
                None => {
                    return Err(SchedulerError::Internal(format!(
                        "作业 {job_id} 没有待执行的任务却未完成"
                    )))
                }
            }
        }

        for handle in handles {
            if let Err(e) = self.pool.join(handle) {
                warn!("等待工作单元结束失败: {}", e);
            }
        }
        self.service.job_done(&job_id)?;
        info!("作业 {} 执行完毕", job_id);

        Ok(results.into_iter().flatten().collect())
    }

    /// 申请Worker并把任务放到线程池上执行
    fn dispatch(
        &self,
        job_id: &str,
        job: &Job,
        index: usize,
        sender: &Sender<TaskOutcome>,
    ) -> SchedulerResult<WorkHandle> {
        let worker_id = self.service.require_worker(job_id)?;
        self.hand_over(job_id, job, index, worker_id.clone(), sender)
            .inspect_err(|_| give_back(self.service.as_ref(), job_id, &worker_id))
    }

    fn hand_over(
        &self,
        job_id: &str,
        job: &Job,
        index: usize,
        worker_id: WorkerId,
        sender: &Sender<TaskOutcome>,
    ) -> SchedulerResult<WorkHandle> {
        let worker = self
            .workers
            .get(&worker_id)
            .cloned()
            .ok_or_else(|| SchedulerError::worker_not_found(&worker_id))?;
        let task = job
            .task(index)
            .cloned()
            .ok_or_else(|| SchedulerError::Internal(format!("作业 {job_id} 没有任务 {index}")))?;

        self.service.task_sent(job_id)?;
        debug!("任务 {}/{} 下发到Worker {}", job_id, index, worker_id);

        let sender = sender.clone();
        let service = self.service.clone();
        let owner = job_id.to_string();
        let scheduled = self.pool.schedule(move || {
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| worker.run_task(&task)))
                .unwrap_or_else(|_| {
                    Err(SchedulerError::TaskExecution("任务执行时发生panic".to_string()))
                });
            if result.is_err() {
                // 执行线程可能正阻塞在申请Worker上，必须在这里归还
                give_back(service.as_ref(), &owner, &worker_id);
            }
            let outcome = TaskOutcome {
                index,
                worker_id,
                elapsed: started.elapsed().as_secs_f64(),
                result,
            };
            if sender.send(outcome).is_err() {
                debug!("作业执行器已退出，丢弃任务结果");
            }
        });

        match scheduled {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.service.task_redo(job_id)?;
                Err(e)
            }
        }
    }

    fn wait(receiver: &Receiver<TaskOutcome>) -> SchedulerResult<TaskOutcome> {
        receiver
            .recv()
            .map_err(|_| SchedulerError::Internal("任务结果通道已关闭".to_string()))
    }

    /// 处理一个任务的执行结果，返回新完成的任务数
    fn settle(
        &self,
        job_id: &str,
        outcome: TaskOutcome,
        pending: &mut VecDeque<usize>,
        results: &mut [Option<TaskResult>],
    ) -> SchedulerResult<usize> {
        let TaskOutcome {
            index,
            worker_id,
            elapsed,
            result,
        } = outcome;

        let result = match result {
            Ok(result) => result,
            Err(e) if e.is_retryable() => {
                warn!(
                    "任务 {}/{} 在Worker {} 上因网络失败中断，重新排队: {}",
                    job_id, index, worker_id, e
                );
                self.service.task_redo(job_id)?;
                pending.push_back(index);
                return Ok(0);
            }
            Err(e) => {
                error!("任务 {}/{} 在Worker {} 上执行失败: {}", job_id, index, worker_id, e);
                TaskResult {
                    task_id: index,
                    job_id: job_id.to_string(),
                    duration_seconds: elapsed,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        };

        self.service.task_done(job_id, &result)?;
        results[index] = Some(result);
        Ok(1)
    }
}

/// 把没能完成任务的Worker交还调度中心
fn give_back(service: &dyn JobService, job_id: &str, worker_id: &str) {
    if let Err(e) = service.return_worker(job_id, worker_id) {
        warn!("归还Worker {} 失败: {}", worker_id, e);
    }
}

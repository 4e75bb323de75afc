//! Concurrency engines for the fetch-and-process pipeline
//!
//! Every engine satisfies the same contract: run the worker once per task
//! and return one `(index, outcome)` pair per task, in any completion
//! order. The orchestrator restores input order afterwards, so engines are
//! interchangeable and must be observationally equivalent for the same
//! worker behavior.

use crate::{CensusError, CensusWorker, Config, HttpContentFetcher, ItemOutcome, ItemWorker, Record};
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::io::Read;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// One unit of pipeline work: a record tagged with its input position.
#[derive(Debug, Clone)]
pub struct ItemTask {
    pub index: usize,
    pub record: Record,
}

/// A strategy for executing a batch of independent item tasks.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn execute(
        &self,
        tasks: Vec<ItemTask>,
        worker: Arc<dyn ItemWorker>,
    ) -> Vec<(usize, ItemOutcome)>;
}

/// CLI-selectable engine names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Sequential,
    Cooperative,
    Threaded,
    Process,
}

impl EngineKind {
    pub const NAMES: [&'static str; 4] = ["sequential", "cooperative", "threaded", "process"];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sequential" => Some(EngineKind::Sequential),
            "cooperative" => Some(EngineKind::Cooperative),
            "threaded" => Some(EngineKind::Threaded),
            "process" => Some(EngineKind::Process),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Sequential => "sequential",
            EngineKind::Cooperative => "cooperative",
            EngineKind::Threaded => "threaded",
            EngineKind::Process => "process",
        }
    }

    /// Build the engine with its bounds taken from the configuration.
    pub fn build(&self, config: &Config) -> Box<dyn Engine> {
        match self {
            EngineKind::Sequential => Box::new(SequentialEngine),
            EngineKind::Cooperative => Box::new(CooperativeEngine::new(config.concurrency_limit)),
            EngineKind::Threaded => Box::new(ThreadPoolEngine::new(config.thread_workers)),
            EngineKind::Process => Box::new(ProcessPoolEngine::new(config.process_workers)),
        }
    }
}

/// Processes one item fully before starting the next.
///
/// No concurrency; the correctness baseline the other engines are
/// compared against.
pub struct SequentialEngine;

#[async_trait]
impl Engine for SequentialEngine {
    async fn execute(
        &self,
        tasks: Vec<ItemTask>,
        worker: Arc<dyn ItemWorker>,
    ) -> Vec<(usize, ItemOutcome)> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let outcome = worker.process(task.record).await;
            outcomes.push((task.index, outcome));
        }
        outcomes
    }
}

/// All tasks in flight on one logical thread of control, suspending at
/// each network wait, with the fan-out bounded by the configured limit.
pub struct CooperativeEngine {
    concurrency_limit: usize,
}

impl CooperativeEngine {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }
}

#[async_trait]
impl Engine for CooperativeEngine {
    async fn execute(
        &self,
        tasks: Vec<ItemTask>,
        worker: Arc<dyn ItemWorker>,
    ) -> Vec<(usize, ItemOutcome)> {
        stream::iter(tasks)
            .map(|task| {
                let worker = worker.clone();
                async move { (task.index, worker.process(task.record).await) }
            })
            .buffer_unordered(self.concurrency_limit)
            .collect()
            .await
    }
}

/// A fixed set of OS worker threads draining a shared task queue.
///
/// Each thread drives its items to completion on its own single-threaded
/// runtime, so the worker seam stays async while the parallelism is real
/// threads. All threads are joined before returning. The queue mutex
/// guards dispatch only; item data is owned by exactly one thread at a
/// time.
pub struct ThreadPoolEngine {
    workers: usize,
}

impl ThreadPoolEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

#[async_trait]
impl Engine for ThreadPoolEngine {
    async fn execute(
        &self,
        tasks: Vec<ItemTask>,
        worker: Arc<dyn ItemWorker>,
    ) -> Vec<(usize, ItemOutcome)> {
        let worker_count = self.workers.min(tasks.len().max(1));
        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, rx) = std::sync::mpsc::channel();

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let queue = queue.clone();
            let worker = worker.clone();
            let tx = tx.clone();

            handles.push(std::thread::spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Worker thread failed to start a runtime: {e}");
                        return;
                    }
                };

                loop {
                    let task = queue.lock().unwrap().pop_front();
                    let Some(task) = task else { break };
                    let outcome = runtime.block_on(worker.process(task.record));
                    if tx.send((task.index, outcome)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        // Collect and join off the async executor so sibling engines'
        // futures keep making progress while the threads run.
        let collected = tokio::task::spawn_blocking(move || {
            let mut outcomes = Vec::new();
            while let Ok(pair) = rx.recv() {
                outcomes.push(pair);
            }
            for handle in handles {
                if handle.join().is_err() {
                    error!("A worker thread panicked");
                }
            }
            outcomes
        })
        .await;

        match collected {
            Ok(outcomes) => outcomes,
            Err(e) => {
                error!("Thread pool collection failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Subprocess workers bounded by `max(1, logical_cores - 1)`.
///
/// Records and outcomes cross the process boundary by value as JSON over
/// the child's stdin/stdout; nothing is shared between workers. A worker
/// failure is recorded as that item's outcome, never the batch's. The
/// injected in-process worker is unused here: each subprocess builds the
/// HTTP-backed worker itself.
pub struct ProcessPoolEngine {
    workers: usize,
}

impl ProcessPoolEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn default_worker_count() -> usize {
        num_cpus::get().saturating_sub(1).max(1)
    }

    async fn run_worker_process(task: &ItemTask) -> Result<ItemOutcome, CensusError> {
        let exe = std::env::current_exe()
            .map_err(|e| CensusError::WorkerError(format!("cannot locate worker binary: {e}")))?;

        let mut child = Command::new(exe)
            .arg("--pixel-worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CensusError::WorkerError(format!("spawn failed: {e}")))?;

        let payload = serde_json::to_vec(&task.record)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CensusError::WorkerError("worker stdin unavailable".to_string()))?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| CensusError::WorkerError(format!("write to worker failed: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CensusError::WorkerError(format!("wait for worker failed: {e}")))?;

        if !output.status.success() {
            return Err(CensusError::WorkerError(format!(
                "worker exited with {}",
                output.status
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| CensusError::WorkerError(format!("unparseable worker reply: {e}")))
    }
}

#[async_trait]
impl Engine for ProcessPoolEngine {
    async fn execute(
        &self,
        tasks: Vec<ItemTask>,
        _worker: Arc<dyn ItemWorker>,
    ) -> Vec<(usize, ItemOutcome)> {
        let pool = Arc::new(Semaphore::new(self.workers));

        let children = tasks.into_iter().map(|task| {
            let pool = pool.clone();
            async move {
                let _permit = pool.acquire().await.ok();
                let outcome = match Self::run_worker_process(&task).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Worker process failed for {}: {e}", task.record);
                        ItemOutcome::from(&e)
                    }
                };
                (task.index, outcome)
            }
        });

        join_all(children).await
    }
}

/// Entry point for `--pixel-worker` subprocesses.
///
/// Reads one record as JSON from stdin, drives it through the pipeline
/// worker, and writes the outcome as JSON to stdout. Failures inside the
/// worker are already folded into the outcome; only protocol problems
/// (unreadable stdin, unparseable record) surface as errors.
pub async fn serve_pixel_worker() -> Result<(), CensusError> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let record: Record = serde_json::from_str(&input)?;

    let worker = CensusWorker::new(Arc::new(HttpContentFetcher::new()));
    let outcome = worker.process(record).await;

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Deterministic worker with url-keyed outcomes and uneven latencies,
    /// so concurrent engines genuinely complete out of order.
    struct ScriptedWorker;

    #[async_trait]
    impl ItemWorker for ScriptedWorker {
        async fn process(&self, record: Record) -> ItemOutcome {
            let delay = if record.url.contains("slow") { 20 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if !record.is_image() {
                return ItemOutcome::Skipped;
            }
            if record.url.contains("broken") {
                return ItemOutcome::FetchFailed {
                    reason: format!("content fetch failed for {}: HTTP 500", record.url),
                };
            }
            ItemOutcome::ColorCount(record.url.len() as u64)
        }
    }

    fn task(index: usize, kind: &str, url: &str) -> ItemTask {
        ItemTask {
            index,
            record: Record {
                url: url.to_string(),
                kind: kind.to_string(),
                title: format!("#{index}"),
                date: "2024-05-01".to_string(),
            },
        }
    }

    fn sample_tasks() -> Vec<ItemTask> {
        vec![
            task(0, "image", "https://example.com/slow-first.png"),
            task(1, "image", "https://example.com/broken.png"),
            task(2, "video", "https://example.com/v.mp4"),
            task(3, "image", "https://example.com/quick.png"),
            task(4, "image", "https://example.com/slow-last.png"),
        ]
    }

    fn sorted(mut outcomes: Vec<(usize, ItemOutcome)>) -> Vec<(usize, ItemOutcome)> {
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes
    }

    #[tokio::test]
    async fn test_engines_are_equivalent() {
        let worker: Arc<dyn ItemWorker> = Arc::new(ScriptedWorker);

        let baseline = sorted(
            SequentialEngine
                .execute(sample_tasks(), worker.clone())
                .await,
        );
        let cooperative = sorted(
            CooperativeEngine::new(3)
                .execute(sample_tasks(), worker.clone())
                .await,
        );
        let threaded = sorted(
            ThreadPoolEngine::new(2)
                .execute(sample_tasks(), worker.clone())
                .await,
        );

        assert_eq!(baseline.len(), sample_tasks().len());
        assert_eq!(baseline, cooperative);
        assert_eq!(baseline, threaded);
    }

    #[tokio::test]
    async fn test_sequential_outcomes_per_task() {
        let worker: Arc<dyn ItemWorker> = Arc::new(ScriptedWorker);
        let outcomes = sorted(SequentialEngine.execute(sample_tasks(), worker).await);

        assert!(matches!(outcomes[0].1, ItemOutcome::ColorCount(_)));
        assert!(matches!(outcomes[1].1, ItemOutcome::FetchFailed { .. }));
        assert_eq!(outcomes[2].1, ItemOutcome::Skipped);
        assert!(matches!(outcomes[3].1, ItemOutcome::ColorCount(_)));
    }

    #[tokio::test]
    async fn test_cooperative_failure_does_not_abort_siblings() {
        let worker: Arc<dyn ItemWorker> = Arc::new(ScriptedWorker);
        let outcomes = sorted(
            CooperativeEngine::new(8)
                .execute(sample_tasks(), worker)
                .await,
        );

        assert_eq!(outcomes.len(), 5);
        let successes = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ItemOutcome::ColorCount(_)))
            .count();
        assert_eq!(successes, 3);
    }

    #[tokio::test]
    async fn test_thread_pool_handles_more_tasks_than_workers() {
        let worker: Arc<dyn ItemWorker> = Arc::new(ScriptedWorker);
        let tasks: Vec<ItemTask> = (0..12)
            .map(|i| task(i, "image", &format!("https://example.com/{i}.png")))
            .collect();

        let outcomes = sorted(ThreadPoolEngine::new(3).execute(tasks, worker).await);
        assert_eq!(outcomes.len(), 12);
        for (i, (index, _)) in outcomes.iter().enumerate() {
            assert_eq!(i, *index);
        }
    }

    #[tokio::test]
    async fn test_engines_accept_empty_batches() {
        let worker: Arc<dyn ItemWorker> = Arc::new(ScriptedWorker);
        assert!(SequentialEngine
            .execute(Vec::new(), worker.clone())
            .await
            .is_empty());
        assert!(CooperativeEngine::new(4)
            .execute(Vec::new(), worker.clone())
            .await
            .is_empty());
        assert!(ThreadPoolEngine::new(4)
            .execute(Vec::new(), worker)
            .await
            .is_empty());
    }

    #[test]
    fn test_engine_kind_names_round_trip() {
        for name in EngineKind::NAMES {
            let kind = EngineKind::from_name(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert_eq!(EngineKind::from_name("warp-drive"), None);
    }

    #[test]
    fn test_process_pool_default_worker_count_is_bounded() {
        let count = ProcessPoolEngine::default_worker_count();
        assert!(count >= 1);
        assert!(count <= num_cpus::get());
    }

    #[test]
    fn test_engine_bounds_never_collapse_to_zero() {
        assert_eq!(CooperativeEngine::new(0).concurrency_limit, 1);
        assert_eq!(ThreadPoolEngine::new(0).workers, 1);
        assert_eq!(ProcessPoolEngine::new(0).workers, 1);
    }
}

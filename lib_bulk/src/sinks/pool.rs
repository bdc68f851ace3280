//! # Queued Sink Worker Pool
//!
//! A bounded set of worker threads draining one synchronized FIFO queue.
//!
//! ## Lifecycle:
//!
//! 1.  `start(n)` spawns `n` named workers (at least one).
//! 2.  `enqueue` appends a block under the queue lock and wakes one worker.
//!     It never waits for rendering.
//! 3.  `stop()` raises the `finished` flag, wakes every worker and joins them.
//!     A worker exits only when `finished` is set **and** the queue is empty,
//!     so everything enqueued before `stop()` is rendered.
//!
//! Rendering happens outside the queue lock. With more than one worker, FIFO
//! dequeue order does not imply render-completion order.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::core::block::Block;
use crate::core::dispatcher::BlockObserver;
use crate::core::metrics::Metrics;
use crate::error::BulkError;

/// Turns one block into output. Called concurrently from every worker.
pub trait BlockRenderer: Send + Sync + 'static {
    /// Short sink kind used in logs and thread names (`log`, `file`).
    fn kind(&self) -> &'static str;

    /// Metrics name of the worker with the given zero-based index.
    fn thread_name(&self, index: usize) -> String {
        format!("{}{}", self.kind(), index + 1)
    }

    /// Writes `block` to the output medium.
    fn render(&self, block: &Block) -> Result<(), BulkError>;
}

#[derive(Default)]
struct SinkQueue {
    items: VecDeque<Arc<Block>>,
    finished: bool,
}

struct Shared<R> {
    queue: Mutex<SinkQueue>,
    available: Condvar,
    renderer: R,
    metrics: Arc<Metrics>,
}

impl<R> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, SinkQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// # Queued Sink
///
/// An observer that buffers blocks and renders them on its own threads.
pub struct QueuedSink<R: BlockRenderer> {
    shared: Arc<Shared<R>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: BlockRenderer> QueuedSink<R> {
    /// Creates a sink with no workers yet; see [`QueuedSink::start`].
    pub fn new(renderer: R, metrics: Arc<Metrics>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(SinkQueue::default()),
                available: Condvar::new(),
                renderer,
                metrics,
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a sink and starts `worker_count` workers.
    pub fn spawn(renderer: R, metrics: Arc<Metrics>, worker_count: usize) -> Result<Self, BulkError> {
        let sink = Self::new(renderer, metrics);
        sink.start(worker_count)?;
        Ok(sink)
    }

    /// # Start
    ///
    /// Adds `worker_count` workers (zero is treated as one). A stopped sink
    /// with no remaining workers is reopened.
    ///
    /// # Returns
    /// The total number of running workers.
    pub fn start(&self, worker_count: usize) -> Result<usize, BulkError> {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if workers.is_empty() {
            self.shared.lock().finished = false;
        }

        for _ in 0..worker_count.max(1) {
            let name = self.shared.renderer.thread_name(workers.len());
            let shared = Arc::clone(&self.shared);
            let metrics_name = name.clone();
            let handle = thread::Builder::new()
                .name(format!("bulk-{name}"))
                .spawn(move || worker_loop(shared, metrics_name))
                .map_err(|source| BulkError::WorkerSpawn { name, source })?;
            workers.push(handle);
        }

        log::debug!(
            "Sink '{}' running {} workers",
            self.shared.renderer.kind(),
            workers.len()
        );
        Ok(workers.len())
    }

    /// # Enqueue
    ///
    /// Appends `block` and wakes one worker. Never blocks on rendering.
    pub fn enqueue(&self, block: Arc<Block>) -> Result<(), BulkError> {
        let mut queue = self.shared.lock();
        if queue.finished {
            return Err(BulkError::SinkStopped {
                sink: self.shared.renderer.kind().to_string(),
            });
        }
        queue.items.push_back(block);
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Number of blocks waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Number of running workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` once `stop()` has been called and the sink has not been restarted.
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().finished
    }

    /// # Stop
    ///
    /// Signals termination, waits for the queue to drain and joins every
    /// worker. Calling it again is a no-op.
    pub fn stop(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.lock().finished = true;
        self.shared.available.notify_all();

        let joined = workers.len();
        for handle in workers.drain(..) {
            let name = handle.thread().name().unwrap_or("bulk-worker").to_string();
            if handle.join().is_err() {
                log::error!("Sink worker {} panicked", name);
            }
        }
        if joined > 0 {
            log::debug!(
                "Sink '{}' stopped, {} workers joined",
                self.shared.renderer.kind(),
                joined
            );
        }
    }
}

impl<R: BlockRenderer> BlockObserver for QueuedSink<R> {
    fn update(&self, block: Arc<Block>) {
        if let Err(e) = self.enqueue(block) {
            log::warn!("Dropping block: {}", e);
        }
    }
}

impl<R: BlockRenderer> Drop for QueuedSink<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop<R: BlockRenderer>(shared: Arc<Shared<R>>, name: String) {
    shared.metrics.register_thread(&name);

    loop {
        let next = {
            let mut queue = shared.lock();
            loop {
                if let Some(block) = queue.items.pop_front() {
                    break Some(block);
                }
                if queue.finished {
                    break None;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Some(block) = next else {
            break;
        };

        match shared.renderer.render(&block) {
            Ok(()) => {
                shared.metrics.add_blocks(1);
                shared.metrics.add_commands(block.len() as u64);
            }
            // The block is lost; the worker keeps serving the queue.
            Err(e) => log::error!("Sink '{}' failed to render block: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<Vec<String>>>,
        failures: AtomicUsize,
    }

    impl BlockRenderer for Arc<Collect> {
        fn kind(&self) -> &'static str {
            "test"
        }

        fn render(&self, block: &Block) -> Result<(), BulkError> {
            if block.commands().iter().any(|c| c == "fail") {
                self.failures.fetch_add(1, Ordering::SeqCst);
                return Err(std::io::Error::other("boom").into());
            }
            // Slow enough that stop() races a non-empty queue.
            thread::sleep(Duration::from_millis(1));
            self.seen.lock().unwrap().push(block.commands().to_vec());
            Ok(())
        }
    }

    fn block(cmds: &[&str]) -> Arc<Block> {
        Arc::new(Block::new(7, cmds.iter().map(|c| c.to_string()).collect()))
    }

    #[test]
    fn stop_drains_everything_enqueued() {
        let collect = Arc::new(Collect::default());
        let metrics = Arc::new(Metrics::new());
        let sink = QueuedSink::spawn(Arc::clone(&collect), Arc::clone(&metrics), 3).unwrap();
        for i in 0..100 {
            sink.enqueue(block(&[&format!("c{i}"), "x"])).unwrap();
        }
        sink.stop();

        assert_eq!(collect.seen.lock().unwrap().len(), 100);
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.worker_count(), 0);
        let total = metrics.totals("test");
        assert_eq!(total.blocks, 100);
        assert_eq!(total.commands, 200);
    }

    #[test]
    fn single_worker_keeps_fifo_order() {
        let collect = Arc::new(Collect::default());
        let sink = QueuedSink::spawn(Arc::clone(&collect), Arc::new(Metrics::new()), 1).unwrap();
        for i in 0..20 {
            sink.enqueue(block(&[&i.to_string()])).unwrap();
        }
        sink.stop();

        let seen: Vec<String> = collect.seen.lock().unwrap().iter().map(|b| b[0].clone()).collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn render_failure_keeps_worker_alive() {
        let collect = Arc::new(Collect::default());
        let metrics = Arc::new(Metrics::new());
        let sink = QueuedSink::spawn(Arc::clone(&collect), Arc::clone(&metrics), 1).unwrap();
        sink.enqueue(block(&["fail"])).unwrap();
        sink.enqueue(block(&["ok"])).unwrap();
        sink.stop();

        assert_eq!(collect.failures.load(Ordering::SeqCst), 1);
        assert_eq!(*collect.seen.lock().unwrap(), vec![vec!["ok".to_string()]]);
        assert_eq!(metrics.totals("test").blocks, 1);
    }

    #[test]
    fn zero_workers_means_one() {
        let sink = QueuedSink::spawn(Arc::new(Collect::default()), Arc::new(Metrics::new()), 0).unwrap();
        assert_eq!(sink.worker_count(), 1);
    }

    #[test]
    fn enqueue_after_stop_is_rejected_and_restart_reopens() {
        let collect = Arc::new(Collect::default());
        let sink = QueuedSink::spawn(Arc::clone(&collect), Arc::new(Metrics::new()), 1).unwrap();
        sink.stop();
        sink.stop();
        assert!(sink.is_stopped());
        assert!(matches!(
            sink.enqueue(block(&["late"])),
            Err(BulkError::SinkStopped { .. })
        ));

        sink.start(2).unwrap();
        assert!(!sink.is_stopped());
        sink.enqueue(block(&["again"])).unwrap();
        sink.stop();
        assert_eq!(*collect.seen.lock().unwrap(), vec![vec!["again".to_string()]]);
    }

    #[test]
    fn workers_are_named_by_index() {
        let metrics = Arc::new(Metrics::new());
        let sink = QueuedSink::spawn(Arc::new(Collect::default()), Arc::clone(&metrics), 2).unwrap();
        sink.stop();
        let mut names: Vec<String> = metrics.snapshot().into_iter().map(|s| s.name).collect();
        names.sort();
        assert_eq!(names, vec!["test1".to_string(), "test2".to_string()]);
    }
}

use super::{
    config::Config,
    errors::SpawnError,
    log::{SharedLogger, TracingLogger},
    model::{PoolMetrics, Task},
    queue::{ChannelQueue, SharedQueue},
    registry::panic_message,
};
use parking_lot::Mutex;
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;


/// Фиксированный пул из N потоков над общей очередью.
///
/// Число одновременно выполняемых задач ограничено числом потоков, поэтому
/// реестр здесь не нужен. Рабочие потоки ждут задачу с таймаутом, чтобы
/// замечать остановку даже при пустой очереди.
pub struct FixedPoolDispatcher {
    queue: SharedQueue<Task>,
    cancellation_token: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<WorkerStats>,
    logger: SharedLogger,
}

#[derive(Default)]
struct WorkerStats {
    running_workers: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl FixedPoolDispatcher {
    pub fn new(thread_count: usize) -> Result<Self, SpawnError> {
        Self::with_config(Config::default().with_thread_count(thread_count))
    }

    pub fn with_config(config: Config) -> Result<Self, SpawnError> {
        let queue: SharedQueue<Task> = Arc::new(ChannelQueue::new(config.queue_capacity));
        Self::with_parts(config, queue, TracingLogger::shared())
    }

    pub fn with_parts(
        config: Config,
        queue: SharedQueue<Task>,
        logger: SharedLogger,
    ) -> Result<Self, SpawnError> {
        let thread_count = config.thread_count.max(1);
        let cancellation_token = CancellationToken::new();
        let stats = Arc::new(WorkerStats::default());
        let mut workers = Vec::with_capacity(thread_count);

        for index in 0..thread_count {
            let worker = Worker {
                index,
                queue: queue.clone(),
                cancellation_token: cancellation_token.clone(),
                stats: stats.clone(),
                logger: logger.clone(),
                poll_timeout: config.poll_timeout,
            };

            stats.running_workers.fetch_add(1, Ordering::SeqCst);
            match config.thread_builder(format!("fixed-{}", index)).spawn(move || worker.run()) {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    stats.running_workers.fetch_sub(1, Ordering::SeqCst);
                    logger.error(&format!("create fixed pool thread {} failed: {}", index, source));

                    // Не оставляем частично запущенный пул
                    cancellation_token.cancel();
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }

                    return Err(SpawnError::ThreadSpawn {
                        name: format!("{}-fixed-{}", config.thread_name, index),
                        source,
                    });
                }
            }
        }

        logger.info(&format!("create {} threads for fixed pool successfully", thread_count));

        Ok(Self {
            queue,
            cancellation_token,
            workers: Mutex::new(workers),
            stats,
            logger,
        })
    }

    pub fn submit(&self, task: Task) {
        if self.queue.push(task).is_err() {
            self.logger.error("fixed pool queue disconnected, task dropped");
        }
    }

    /// Ставит флаг остановки и ждёт все рабочие потоки. Повторный вызов ничего не делает.
    pub fn terminate(&self) {
        self.cancellation_token.cancel();

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for handle in workers {
            if handle.join().is_err() {
                self.logger.error("fixed pool worker thread panicked");
            }
        }

        let left = self.queue.len();
        if left > 0 {
            self.logger.warn(&format!("fixed pool terminated with {} queued tasks", left));
        }
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Сколько рабочих потоков ещё не вышло из цикла
    #[inline]
    pub fn workers(&self) -> usize {
        self.stats.running_workers.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            workers: self.workers(),
            queued: self.queue.len(),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FixedPoolDispatcher {
    fn drop(&mut self) {
        self.terminate();
        self.logger.warn("fixed pool dispatcher destroy successfully");
    }
}


struct Worker {
    index: usize,
    queue: SharedQueue<Task>,
    cancellation_token: CancellationToken,
    stats: Arc<WorkerStats>,
    logger: SharedLogger,
    poll_timeout: Duration,
}

impl Worker {
    fn run(self) {
        self.logger.debug(&format!("fixed pool worker {} begin to run", self.index));

        while !self.cancellation_token.is_cancelled() {
            let Some(task) = self.queue.pop_timeout(self.poll_timeout) else {
                continue;
            };

            match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(0) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(code) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    self.logger.error(&format!("fixed pool task run code {}", code));
                }
                Err(payload) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    self.logger.error(&format!("fixed pool task panicked: {}", panic_message(&*payload)));
                }
            }
        }

        self.stats.running_workers.fetch_sub(1, Ordering::SeqCst);
        self.logger.debug(&format!("fixed pool worker {} about to terminate", self.index));
    }
}

use super::{
    config::Config,
    errors::SpawnError,
    log::{SharedLogger, TracingLogger},
    model::{RegistryMetrics, Task},
    queue::{ChannelQueue, SharedQueue},
    registry::ConcurrencyRegistry,
};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread::JoinHandle,
    time::Duration,
};
use tokio_util::sync::CancellationToken;


/// Поток-на-задачу с буферной очередью.
///
/// `submit` только кладёт задачу в очередь. Отдельный драйвер-поток забирает
/// задачи пачками и передаёт их в `ConcurrencyRegistry`, поэтому давление
/// применяется на этапе диспетчеризации, а не на вызывающей стороне.
pub struct ElasticDispatcher {
    queue: SharedQueue<Task>,
    registry: Arc<ConcurrencyRegistry>,
    cancellation_token: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
    logger: SharedLogger,
}

impl ElasticDispatcher {
    pub fn new(max_concurrency: usize) -> Result<Self, SpawnError> {
        Self::with_config(Config::default().with_max_concurrency(max_concurrency))
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
        let registry = Arc::new(ConcurrencyRegistry::with_config(&config, logger.clone()));
        let cancellation_token = CancellationToken::new();

        let driver = Driver {
            queue: queue.clone(),
            registry: registry.clone(),
            cancellation_token: cancellation_token.clone(),
            logger: logger.clone(),
            batch: config.effective_batch(),
            poll_timeout: config.poll_timeout,
        };

        let name = format!("{}-elastic", config.thread_name);
        let handle = config
            .thread_builder("elastic")
            .spawn(move || driver.run())
            .map_err(|source| {
                logger.error(&format!("create run work thread failed: {}", source));
                SpawnError::ThreadSpawn { name, source }
            })?;

        Ok(Self {
            queue,
            registry,
            cancellation_token,
            driver: Mutex::new(Some(handle)),
            logger,
        })
    }

    /// Ставит задачу в очередь и сразу возвращается
    pub fn submit(&self, task: Task) {
        if self.queue.push(task).is_err() {
            self.logger.error("elastic dispatcher queue disconnected, task dropped");
        }
    }

    /// Останавливает драйвер. Уже принятые задачи продолжают выполняться;
    /// для полного ожидания есть `shutdown`.
    pub fn terminate(&self) {
        self.cancellation_token.cancel();

        let Some(handle) = self.driver.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            self.logger.error("elastic dispatcher driver thread panicked");
        }

        let left = self.queue.len();
        if left > 0 {
            self.logger.warn(&format!("elastic dispatcher terminated with {} queued tasks", left));
        }
    }

    pub fn shutdown(&self) {
        self.terminate();
        self.registry.join_all();
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn registry(&self) -> &ConcurrencyRegistry {
        &self.registry
    }

    #[inline]
    pub fn metrics(&self) -> RegistryMetrics {
        self.registry.metrics()
    }
}

impl Drop for ElasticDispatcher {
    fn drop(&mut self) {
        self.terminate();
        self.logger.warn("elastic dispatcher destroy successfully");
    }
}


struct Driver {
    queue: SharedQueue<Task>,
    registry: Arc<ConcurrencyRegistry>,
    cancellation_token: CancellationToken,
    logger: SharedLogger,
    batch: usize,
    poll_timeout: Duration,
}

impl Driver {
    fn run(self) {
        self.logger.info("elastic dispatcher driver begin to run");

        while !self.cancellation_token.is_cancelled() {
            let tasks = self.queue.pop_batch(self.batch, self.poll_timeout);
            if tasks.is_empty() {
                continue;
            }

            let count = tasks.len();
            for task in tasks {
                self.registry.admit(task);
            }

            self.logger.debug(&format!("count {} task process done", count));
        }

        self.logger.info("elastic dispatcher driver about to terminate");
    }
}

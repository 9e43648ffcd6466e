use super::model::Concurrency;
use std::{
    fmt::Display,
    thread,
    time::Duration,
};


pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);


/// Конфигурация диспетчеров
#[derive(Debug, Clone)]
pub struct Config {
    /// Потолок одновременных задач для эластичного диспетчера
    pub max_concurrency: Concurrency,
    /// Число рабочих потоков фиксированного пула
    pub thread_count: usize,
    /// Размер пачки, если потолок не ограничен
    pub batch_size: usize,
    /// Сколько ждать задачи, прежде чем снова проверить флаг остановки
    pub poll_timeout: Duration,
    /// `None` — очередь без ограничения
    pub queue_capacity: Option<usize>,
    pub thread_name: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_concurrency: Concurrency::bounded(num_cpus * 2), // Для I/O-bound задач
            thread_count: num_cpus * 2,
            batch_size: num_cpus * 2,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            queue_capacity: None,
            thread_name: "dispatch".to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_concurrency: Concurrency::bounded(num_cpus),
            thread_count: num_cpus,
            batch_size: num_cpus,
            queue_capacity: Some(num_cpus * 10),
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_concurrency: Concurrency::bounded(num_cpus * 4),
            thread_count: num_cpus * 2,
            batch_size: num_cpus * 4,
            queue_capacity: None,
            ..Default::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Concurrency::bounded(max_concurrency);
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count.max(1);
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Сколько задач драйвер забирает из очереди за один проход
    pub fn effective_batch(&self) -> usize {
        self.max_concurrency.get().unwrap_or(self.batch_size).max(1)
    }

    pub(crate) fn thread_builder(&self, suffix: impl Display) -> thread::Builder {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.thread_name, suffix));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        builder
    }
}

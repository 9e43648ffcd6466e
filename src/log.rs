//! Логирование как внедряемая зависимость.
//!
//! Компоненты получают `SharedLogger` при создании и не обращаются к глобальному
//! состоянию напрямую. По умолчанию используется [`TracingLogger`].

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::Level;


pub type SharedLogger = Arc<dyn Logger>;

pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    #[inline]
    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message)
    }

    #[inline]
    fn info(&self, message: &str) {
        self.log(Level::INFO, message)
    }

    #[inline]
    fn warn(&self, message: &str) {
        self.log(Level::WARN, message)
    }

    #[inline]
    fn error(&self, message: &str) {
        self.log(Level::ERROR, message)
    }
}


/// Пересылает сообщения в `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn shared() -> SharedLogger {
        Arc::new(TracingLogger)
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "thread_dispatch", "{}", message),
            Level::WARN => tracing::warn!(target: "thread_dispatch", "{}", message),
            Level::INFO => tracing::info!(target: "thread_dispatch", "{}", message),
            Level::DEBUG => tracing::debug!(target: "thread_dispatch", "{}", message),
            _ => tracing::trace!(target: "thread_dispatch", "{}", message),
        }
    }
}


/// Запоминает все записи в памяти. Нужен тестам, чтобы проверять побочный канал.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.records.lock().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        self.records.lock().push((level, message.to_string()));
    }
}

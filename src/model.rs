use std::{
    fmt,
    num::NonZeroUsize,
};


/// Единица работы: замыкание без аргументов, возвращающее код статуса.
/// `0` означает успех, любой другой код логируется как ошибка задачи.
pub type Task = Box<dyn FnOnce() -> i32 + Send + 'static>;

#[inline]
pub fn task<F>(f: F) -> Task
where
    F: FnOnce() -> i32 + Send + 'static,
{
    Box::new(f)
}


/// Потолок одновременно выполняемых задач.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Bounded(NonZeroUsize),
    Unbounded,
}

impl Concurrency {
    /// Ноль приводится к единице: реестр без слотов не смог бы принять ни одной задачи.
    pub fn bounded(limit: usize) -> Self {
        Concurrency::Bounded(NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN))
    }

    #[inline]
    pub fn admits(&self, live: usize) -> bool {
        match self {
            Concurrency::Bounded(limit) => live < limit.get(),
            Concurrency::Unbounded => true,
        }
    }

    pub fn get(&self) -> Option<usize> {
        match self {
            Concurrency::Bounded(limit) => Some(limit.get()),
            Concurrency::Unbounded => None,
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concurrency::Bounded(limit) => write!(f, "{}", limit),
            Concurrency::Unbounded => f.write_str("unbounded"),
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardId(u64);

impl GuardId {
    /// Идентификаторы выдаёт только реестр
    #[inline]
    pub(crate) fn new(raw: u64) -> Self {
        GuardId(raw)
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}


impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}


/// Жизненный цикл `TaskGuard`: поток выполняет задачу, затем снимает себя
/// с учёта и ждёт, пока его join сделает кто-то другой.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Running,
    PendingJoin,
    Disposed,
}


#[derive(Debug, Clone)]
pub struct RegistryMetrics {
    pub live: usize,
    pub awaiting_join: usize,
    pub admitted: usize,
    pub completed: usize,
    pub failed: usize,
}

impl RegistryMetrics {
    pub fn utilization(&self, limit: Concurrency) -> f64 {
        match limit.get() {
            Some(limit) => self.live as f64 / limit as f64,
            None => 0.0,
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.completed as f64 / total as f64
    }
}


#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub queued: usize,
    pub completed: usize,
    pub failed: usize,
}

impl PoolMetrics {
    pub fn queue_pressure(&self) -> f64 {
        if self.workers == 0 {
            return self.queued as f64;
        }
        self.queued as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.completed as f64 / total as f64
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ceiling_is_normalized() {
        assert_eq!(Concurrency::bounded(0).get(), Some(1));
        assert!(Concurrency::bounded(0).admits(0));
        assert!(!Concurrency::bounded(0).admits(1));
        assert!(Concurrency::Unbounded.admits(usize::MAX));
    }

    #[test]
    fn success_rate_without_tasks() {
        let metrics = PoolMetrics { workers: 2, queued: 4, completed: 0, failed: 0 };
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.queue_pressure(), 2.0);
    }
}

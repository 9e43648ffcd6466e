//! Ядро выполнения коротких задач вне потока вызывающего
//!
//! # Features
//! - `ElasticDispatcher`: поток на задачу с буферной очередью и потолком параллелизма
//! - `FixedPoolDispatcher`: фиксированный пул потоков над блокирующей очередью
//! - `ConcurrencyRegistry`: учёт живых потоков с блокирующим и неблокирующим приёмом
//! - Двухфазная остановка: флаг, затем join драйверов
//! - Логирование через внедряемый `Logger`, по умолчанию в `tracing`

pub mod config;
pub mod elastic;
pub mod errors;
pub mod fixed;
pub mod log;
pub mod model;
pub mod queue;
pub mod registry;

pub use config::Config;
pub use elastic::ElasticDispatcher;
pub use errors::{QueueError, SpawnError};
pub use fixed::FixedPoolDispatcher;
pub use log::{Logger, MemoryLogger, SharedLogger, TracingLogger};
pub use model::{task, Concurrency, GuardId, GuardState, Task};
pub use queue::{ChannelQueue, SharedQueue, WorkQueue};
pub use registry::{ConcurrencyRegistry, TaskGuard};

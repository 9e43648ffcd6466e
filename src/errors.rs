use std::io;
use thiserror::Error;


/// Ошибка запуска потока. Единственная ошибка, которая выходит за границу API:
/// конструкторы диспетчеров возвращают её вместо частично запущенного пула.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn thread `{name}`: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    pub fn thread_name(&self) -> &str {
        match self {
            SpawnError::ThreadSpawn { name, .. } => name,
        }
    }
}


#[derive(Debug, PartialEq, Eq, Clone, Error)]
pub enum QueueError {
    #[error("work queue is disconnected")]
    Disconnected,
}

//! Реестр одновременно выполняемых задач.
//!
//! Каждая принятая задача получает собственный поток, которым владеет `TaskGuard`.
//! Последним действием поток снимает свой guard с учёта; join потока выполняет
//! уже не он сам, а следующий вызов `admit`/`try_admit` или `join_all`.

use super::{
    config::Config,
    log::SharedLogger,
    model::{
        Concurrency,
        GuardId,
        GuardState,
        RegistryMetrics,
        Task,
    },
};
use parking_lot::{Condvar, Mutex};
use std::{
    any::Any,
    cell::Cell,
    collections::HashMap,
    mem,
    panic::{self, AssertUnwindSafe},
    process,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};


thread_local! {
    /// Реестр и guard, чью задачу выполняет текущий поток
    static CURRENT_GUARD: Cell<Option<(usize, GuardId)>> = const { Cell::new(None) };
}


/// Поток одной задачи.
pub struct TaskGuard {
    id: GuardId,
    state: GuardState,
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    #[inline]
    pub fn id(&self) -> GuardId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> GuardState {
        self.state
    }

    fn dispose(mut self, logger: &SharedLogger) {
        debug_assert_eq!(self.state, GuardState::PendingJoin);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                logger.error(&format!("task guard {} thread panicked after deregistration", self.id));
            }
        }
        self.state = GuardState::Disposed;
        logger.debug(&format!("task guard {} disposed", self.id));
    }
}


struct Slots {
    live: HashMap<GuardId, TaskGuard>,
    pending_join: Vec<TaskGuard>,
    next_id: u64,
    admitted: usize,
}

struct Shared {
    limit: Concurrency,
    slots: Mutex<Slots>,
    slot_freed: Condvar,
    completed: AtomicUsize,
    failed: AtomicUsize,
    logger: SharedLogger,
    config: Config,
}

impl Shared {
    /// Вызывается под локом реестра. Поток не сможет снять себя с учёта раньше,
    /// чем guard окажется в `live`: `deregister` ждёт этот же лок.
    fn start(self: &Arc<Self>, slots: &mut Slots, task: Task) -> bool {
        let id = GuardId::new(slots.next_id);

        let shared = Arc::clone(self);
        let spawned = self
            .config
            .thread_builder(format!("guard-{}", id.as_u64()))
            .spawn(move || shared.run_guard(id, task));

        match spawned {
            Ok(handle) => {
                slots.live.insert(id, TaskGuard {
                    id,
                    state: GuardState::Running,
                    handle: Some(handle),
                });
                slots.next_id += 1;
                slots.admitted += 1;
                true
            }
            Err(e) => {
                self.logger.error(&format!("create task guard {} failed: {}", id, e));
                false
            }
        }
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const Shared as usize
    }

    /// Guard, который выполняется в текущем потоке, если поток принадлежит этому реестру
    fn current_guard(&self) -> Option<GuardId> {
        match CURRENT_GUARD.with(Cell::get) {
            Some((key, id)) if key == self.key() => Some(id),
            _ => None,
        }
    }

    fn run_guard(&self, id: GuardId, task: Task) {
        CURRENT_GUARD.with(|current| current.set(Some((self.key(), id))));
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        CURRENT_GUARD.with(|current| current.set(None));

        match outcome {
            Ok(0) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(code) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.logger.error(&format!("task guard {} run return {}", id, code));
            }
            Err(payload) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.logger.error(&format!("task guard {} panicked: {}", id, panic_message(&*payload)));
            }
        }

        self.deregister(id);
    }

    /// Снять guard с учёта может только его собственный поток.
    fn deregister(&self, id: GuardId) -> bool {
        let mut slots = self.slots.lock();
        let owned = match slots.live.get(&id) {
            None => {
                drop(slots);
                self.logger.error(&format!("deregister: task guard {} not found in live set", id));
                return false;
            }
            Some(guard) => guard
                .handle
                .as_ref()
                .is_some_and(|handle| handle.thread().id() == thread::current().id()),
        };
        if !owned {
            drop(slots);
            self.logger.error(&format!("deregister: task guard {} is not owned by the calling thread", id));
            return false;
        }

        let Some(mut guard) = slots.live.remove(&id) else {
            return false;
        };

        guard.state = GuardState::PendingJoin;
        slots.pending_join.push(guard);
        drop(slots);

        self.slot_freed.notify_all();
        true
    }

    fn dispose_all(&self, guards: Vec<TaskGuard>) {
        for guard in guards {
            guard.dispose(&self.logger);
        }
    }
}


/// Ограничивает число одновременно живых `TaskGuard`.
pub struct ConcurrencyRegistry {
    shared: Arc<Shared>,
}

impl ConcurrencyRegistry {
    pub fn new(limit: Concurrency, logger: SharedLogger) -> Self {
        let config = Config {
            max_concurrency: limit,
            ..Default::default()
        };
        Self::with_config(&config, logger)
    }

    pub fn with_config(config: &Config, logger: SharedLogger) -> Self {
        let shared = Shared {
            limit: config.max_concurrency,
            slots: Mutex::new(Slots {
                live: HashMap::new(),
                pending_join: Vec::new(),
                next_id: 0,
                admitted: 0,
            }),
            slot_freed: Condvar::new(),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            logger,
            config: config.clone(),
        };
        Self { shared: Arc::new(shared) }
    }

    /// Принимает задачу, только если есть свободный слот. Никогда не блокируется
    /// в ожидании слота.
    pub fn try_admit(&self, task: Task) -> bool {
        let mut slots = self.shared.slots.lock();
        let reaped = mem::take(&mut slots.pending_join);

        let admitted = self.shared.limit.admits(slots.live.len())
            && self.shared.start(&mut slots, task);
        drop(slots);

        self.shared.dispose_all(reaped);
        admitted
    }

    /// Блокируется, пока число живых задач не опустится ниже потолка.
    pub fn admit(&self, task: Task) -> bool {
        let limit = self.shared.limit;
        let mut slots = self.shared.slots.lock();
        while !limit.admits(slots.live.len()) {
            self.shared.slot_freed.wait(&mut slots);
        }

        if !limit.admits(slots.live.len()) {
            self.shared.logger.error(&format!(
                "impossible idle slot check: live {} limit {}",
                slots.live.len(),
                limit
            ));
            process::abort();
        }

        let reaped = mem::take(&mut slots.pending_join);
        let admitted = self.shared.start(&mut slots, task);
        drop(slots);

        self.shared.dispose_all(reaped);
        admitted
    }

    /// Снимает guard с учёта и будит ждущих в `admit`. Неизвестный id
    /// логируется и возвращает `false`.
    pub fn deregister(&self, id: GuardId) -> bool {
        self.shared.deregister(id)
    }

    /// Ждёт завершения всех живых задач и делает join их потоков.
    ///
    /// Из потока задачи этого же реестра ждёт всех, кроме себя: свой поток
    /// остаётся без join и отсоединяется, когда реестр будет освобождён.
    pub fn join_all(&self) {
        let own = self.shared.current_guard();
        if let Some(id) = own {
            self.shared.logger.error(&format!(
                "join all called from task guard {}, its own thread is left detached",
                id
            ));
        }

        let reaped = {
            let mut slots = self.shared.slots.lock();
            while slots.live.keys().any(|id| Some(*id) != own) {
                self.shared.slot_freed.wait(&mut slots);
            }
            mem::take(&mut slots.pending_join)
        };

        let count = reaped.len();
        self.shared.dispose_all(reaped);
        self.shared.slot_freed.notify_all();
        self.shared.logger.info(&format!("join all threads finished, count {}", count));
    }

    #[inline]
    pub fn limit(&self) -> Concurrency {
        self.shared.limit
    }

    #[inline]
    pub fn live(&self) -> usize {
        self.shared.slots.lock().live.len()
    }

    #[inline]
    pub fn awaiting_join(&self) -> usize {
        self.shared.slots.lock().pending_join.len()
    }

    /// `None` — реестр никогда не выдавал такой id.
    pub fn guard_state(&self, id: GuardId) -> Option<GuardState> {
        let slots = self.shared.slots.lock();
        if let Some(guard) = slots.live.get(&id) {
            return Some(guard.state());
        }
        if let Some(guard) = slots.pending_join.iter().find(|guard| guard.id() == id) {
            return Some(guard.state());
        }
        // id выдаются подряд и только успешно запущенным guard
        (id.as_u64() < slots.next_id).then_some(GuardState::Disposed)
    }

    pub fn metrics(&self) -> RegistryMetrics {
        let slots = self.shared.slots.lock();
        RegistryMetrics {
            live: slots.live.len(),
            awaiting_join: slots.pending_join.len(),
            admitted: slots.admitted,
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ConcurrencyRegistry {
    fn drop(&mut self) {
        self.join_all();
    }
}


pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

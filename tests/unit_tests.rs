#[cfg(test)]
mod tests {
    use thread_dispatch::{
        config::Config,
        log::MemoryLogger,
        model::{task, Concurrency},
        registry::ConcurrencyRegistry,
    };
    use crossbeam::channel;
    use parking_lot::Mutex;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
        time::{Duration, Instant},
    };
    use tracing::Level;

    fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_admission_bound() {
        println!("\n=== TEST: Потолок параллелизма ===");
        let logger = MemoryLogger::new();
        let registry = ConcurrencyRegistry::new(Concurrency::bounded(3), logger.clone());

        let gauge = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let gauge = gauge.clone();
            let peak = peak.clone();
            assert!(registry.admit(task(move || {
                let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                assert!(now <= 3, "превышен потолок: {}", now);
                thread::sleep(Duration::from_millis(5));
                gauge.fetch_sub(1, Ordering::SeqCst);
                0
            })));
            assert!(registry.live() <= 3);
        }

        registry.join_all();

        let metrics = registry.metrics();
        println!("  Пик: {}, завершено: {}", peak.load(Ordering::SeqCst), metrics.completed);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(metrics.admitted, 20);
        assert_eq!(metrics.completed, 20);
        assert_eq!(metrics.failed, 0);
        assert_eq!(metrics.live, 0);
        assert_eq!(metrics.awaiting_join, 0);
        assert_eq!(logger.count(Level::ERROR), 0);
    }

    #[test]
    fn test_eventual_admission_waits_for_slot() {
        println!("\n=== TEST: Блокирующий admit дожидается слота ===");
        let registry = ConcurrencyRegistry::new(Concurrency::bounded(1), MemoryLogger::new());

        let a_end: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let b_start: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

        let end = a_end.clone();
        assert!(registry.admit(task(move || {
            thread::sleep(Duration::from_millis(100));
            *end.lock() = Some(Instant::now());
            0
        })));

        let start = b_start.clone();
        assert!(registry.admit(task(move || {
            *start.lock() = Some(Instant::now());
            0
        })));

        registry.join_all();

        let a_end = a_end.lock().expect("задача A не завершилась");
        let b_start = b_start.lock().expect("задача B не стартовала");
        assert!(b_start >= a_end, "B стартовала раньше, чем A завершилась");
        println!("  ✓ B стартовала через {:?} после A", b_start - a_end);
    }

    #[test]
    fn test_try_admit_does_not_block() {
        println!("\n=== TEST: try_admit не блокируется ===");
        let registry = ConcurrencyRegistry::new(Concurrency::bounded(1), MemoryLogger::new());
        let (release_tx, release_rx) = channel::bounded::<()>(1);

        assert!(registry.try_admit(task(move || {
            let _ = release_rx.recv();
            0
        })));

        let started = Instant::now();
        assert!(!registry.try_admit(task(|| 0)));
        let elapsed = started.elapsed();
        println!("  Отказ за {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(50));

        release_tx.send(()).unwrap();
        assert!(wait_until(Duration::from_secs(2), || registry.live() == 0));

        assert!(registry.try_admit(task(|| 0)));
        registry.join_all();
        assert_eq!(registry.metrics().completed, 2);
    }

    #[test]
    fn test_admission_reaps_finished_guards() {
        let registry = ConcurrencyRegistry::new(Concurrency::bounded(4), MemoryLogger::new());

        assert!(registry.admit(task(|| 0)));
        assert!(wait_until(Duration::from_secs(2), || registry.awaiting_join() == 1));

        let (release_tx, release_rx) = channel::bounded::<()>(1);
        assert!(registry.admit(task(move || {
            let _ = release_rx.recv();
            0
        })));
        assert_eq!(registry.awaiting_join(), 0);

        release_tx.send(()).unwrap();
        registry.join_all();
    }

    #[test]
    fn test_task_failure_is_logged() {
        println!("\n=== TEST: Ненулевой код и паника задачи ===");
        let logger = MemoryLogger::new();
        let registry = ConcurrencyRegistry::new(Concurrency::bounded(1), logger.clone());

        assert!(registry.admit(task(|| 3)));
        assert!(registry.admit(task(|| panic!("boom in task"))));

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        assert!(registry.admit(task(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            0
        })));

        registry.join_all();

        let metrics = registry.metrics();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.failed, 2);
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.live, 0);
        assert!(logger.contains(Level::ERROR, "run return 3"));
        assert!(logger.contains(Level::ERROR, "boom in task"));
        println!("  Success rate: {:.1}%", metrics.success_rate() * 100.0);
    }

    #[test]
    fn test_unbounded_registry() {
        println!("\n=== TEST: Реестр без потолка ===");
        let registry = ConcurrencyRegistry::new(Concurrency::Unbounded, MemoryLogger::new());
        let barrier = Arc::new(Barrier::new(9));

        for _ in 0..8 {
            let barrier = barrier.clone();
            assert!(registry.try_admit(task(move || {
                barrier.wait();
                0
            })));
        }

        // Все восемь задач должны работать одновременно, иначе барьер не откроется
        barrier.wait();
        registry.join_all();
        assert_eq!(registry.metrics().completed, 8);
    }

    #[test]
    fn test_drop_joins_live_guards() {
        let done = Arc::new(AtomicUsize::new(0));
        {
            let registry = ConcurrencyRegistry::new(Concurrency::bounded(2), MemoryLogger::new());
            for _ in 0..2 {
                let done = done.clone();
                assert!(registry.admit(task(move || {
                    thread::sleep(Duration::from_millis(30));
                    done.fetch_add(1, Ordering::SeqCst);
                    0
                })));
            }
        }
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu", target_pointer_width = "64"))]
    #[test]
    fn test_guard_spawn_failure_rejects_task() {
        println!("\n=== TEST: Ошибка создания потока задачи ===");
        let logger = MemoryLogger::new();
        let config = Config::default()
            .with_max_concurrency(1)
            .with_stack_size(usize::MAX / 2);
        let registry = ConcurrencyRegistry::with_config(&config, logger.clone());

        assert!(!registry.try_admit(task(|| 0)));
        assert!(logger.contains(Level::ERROR, "create task guard"));
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.metrics().admitted, 0);
    }
}

use thread_dispatch::{
    task,
    Config,
    ElasticDispatcher,
    FixedPoolDispatcher,
    SpawnError,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};


fn main() -> Result<(), SpawnError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let now = Instant::now();
    let done = Arc::new(AtomicUsize::new(0));

    let elastic = ElasticDispatcher::with_config(
        Config::cpu_bound().with_poll_timeout(Duration::from_millis(100)),
    )?;
    for i in 0..1_000 {
        let done = done.clone();
        elastic.submit(task(move || {
            let _a = i;
            done.fetch_add(1, Ordering::Relaxed);
            0
        }));
    }
    while elastic.pending() > 0 {
        std::thread::sleep(Duration::from_millis(10));
    }
    elastic.shutdown();
    println!("elastic: {} tasks, elapsed: {:?}", done.load(Ordering::Relaxed), now.elapsed());

    let now = Instant::now();
    let fixed = FixedPoolDispatcher::with_config(
        Config::cpu_bound().with_poll_timeout(Duration::from_millis(100)),
    )?;
    for i in 0..100_000 {
        let done = done.clone();
        fixed.submit(task(move || {
            let _a = i;
            done.fetch_add(1, Ordering::Relaxed);
            0
        }));
    }
    while fixed.pending() > 0 {
        std::thread::sleep(Duration::from_millis(10));
    }
    fixed.terminate();
    println!("fixed: {} tasks total, elapsed: {:?}", done.load(Ordering::Relaxed), now.elapsed());

    Ok(())
}

use task_warden::prelude::*;

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Builder as TokioBuilder;

#[test]
fn test_custom_tokio_runtime_drain() -> AnyResult<()> {
    let rt = TokioBuilder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    let warden = WardenBuilder::default().tokio_runtime_by_custom(rt).build();

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_bunshin = completed.clone();
    warden.launch(&TaskContext::root(), move |_ctx| async move {
        sleep_by_tokio(Duration::from_millis(30)).await;
        completed_bunshin.fetch_add(1, Release);
    });

    warden.stop(true, Duration::from_millis(500));
    assert_eq!(completed.load(Acquire), 1);

    Ok(())
}

#[test]
fn test_shared_tokio_runtime_drain() -> AnyResult<()> {
    let rt = Arc::new(TokioBuilder::new_multi_thread().enable_all().build()?);
    let warden = WardenBuilder::default()
        .tokio_runtime_shared_by_custom(rt.clone())
        .build();

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_bunshin = completed.clone();
    warden.launch(&TaskContext::root(), move |_ctx| async move {
        sleep_by_tokio(Duration::from_millis(30)).await;
        completed_bunshin.fetch_add(1, Release);
    });

    warden.stop(true, Duration::from_millis(500));
    assert_eq!(completed.load(Acquire), 1);

    // Stopping the warden leaves the shared runtime usable by its owner.
    rt.block_on(async {});

    Ok(())
}

#[test]
fn test_attached_tokio_runtime_drain() -> AnyResult<()> {
    let rt = TokioBuilder::new_multi_thread().enable_all().build()?;
    let warden = WardenBuilder::default()
        .tokio_runtime_attached(rt.handle().clone())
        .build();

    let completed = Arc::new(AtomicUsize::new(0));
    let completed_bunshin = completed.clone();
    warden.launch(&TaskContext::root(), move |_ctx| async move {
        sleep_by_tokio(Duration::from_millis(30)).await;
        completed_bunshin.fetch_add(1, Release);
    });

    warden.stop(true, Duration::from_millis(500));
    assert_eq!(completed.load(Acquire), 1);

    Ok(())
}

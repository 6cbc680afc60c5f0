use task_warden::prelude::*;

use std::thread::park_timeout;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// A few cancellation-aware workers on the default warden, then a bounded
// teardown that drains them.
fn main() -> AnyResult<()> {
    // a builder for `FmtSubscriber`.
    FmtSubscriber::builder()
        // all spans/events with a level higher than TRACE (e.g, debug, info, warn, etc.)
        // will be written to stdout.
        .with_max_level(Level::DEBUG)
        // completes the builder.
        .init();

    // Install the process-wide warden; `main` keeps the teardown handle.
    let teardown = init();

    // Develop a handful of periodic async workers.
    for worker_id in 0..3u64 {
        let context = TaskContext::root().with_value("worker_id", worker_id);
        launch(&context, |ctx| async move {
            let worker_id = ctx
                .value::<u64>("worker_id")
                .map(|id| *id)
                .unwrap_or_default();

            loop {
                if ctx.is_cancelled() {
                    println!("worker {} winding down", worker_id);
                    return;
                }
                println!("worker {} doing a slice of work", worker_id);
                sleep_by_tokio(Duration::from_millis(200)).await;
            }
        });
    }

    // A legacy-style synchronous worker rides the blocking pool.
    launch_blocking(&TaskContext::root(), |ctx| {
        while !ctx.is_cancelled() {
            park_timeout(Duration::from_millis(100));
        }
        println!("blocking worker winding down");
    });

    // Let the workers run for a moment, then stop the world; teardown drains
    // for up to thirty seconds before sweeping whatever is left.
    park_timeout(Duration::from_secs(1));
    teardown.teardown();

    Ok(())
}

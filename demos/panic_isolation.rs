use task_warden::prelude::*;

use std::sync::Arc;
use std::thread::park_timeout;
use std::time::Duration;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// Two tasks panic, one through the default hook and one through a custom
// chain; the sibling keeps running and the process never notices.
fn main() -> AnyResult<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .init();

    let warden = Warden::new();

    // The default hook reports this one, tagged with the ambient values.
    let context = TaskContext::root()
        .with_value("request_id", 4242u64)
        .with_value("stage", "checkout".to_string());
    warden.launch(&context, |_ctx| async {
        panic!("pricing backend unreachable");
    });

    // A task-private chain replaces the default for this launch.
    let audit_hook: PanicHook = Arc::new(|ctx: &TaskContext, task_panic: &TaskPanic| {
        println!("audit: `{}` with {}", task_panic.message(), ctx.values());
    });
    let context = TaskContext::root().with_value("request_id", 4243u64);
    warden.launch_with_panic_hooks(
        &context,
        |_ctx| async {
            panic!("inventory cache poisoned");
        },
        vec![audit_hook],
    );

    warden.launch(&TaskContext::root(), |_ctx| async {
        sleep_by_tokio(Duration::from_millis(100)).await;
        println!("sibling task unaffected, finishing normally");
    });

    park_timeout(Duration::from_millis(300));
    warden.stop(true, Duration::from_millis(500));

    Ok(())
}

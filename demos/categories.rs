//! # Example: Categories
//!
//! Several categories of work under one supervisor: overwrite of a running
//! task, cancelling a whole category, waiting for everything to drain and
//! an ordered shutdown through the directory.
//!
//! Run with `RUST_LOG=info cargo run --example categories`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use catvisor::{Config, Directory, Event, TaskError, TaskFn, TaskRef};

/// A job that ticks until cancelled or until `ticks` are done.
fn ticker(label: &'static str, ticks: u32, every_ms: u64) -> TaskRef {
    TaskFn::arc(move |ctx: CancellationToken| async move {
        for n in 1..=ticks {
            tokio::select! {
                _ = ctx.cancelled() => {
                    println!("[{label}] cancelled after {} ticks", n - 1);
                    return Err(TaskError::Canceled);
                }
                _ = tokio::time::sleep(Duration::from_millis(every_ms)) => {
                    println!("[{label}] tick {n}");
                }
            }
        }
        Ok(ticks)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let directory = Directory::new();
    let sup = directory.create_or_replace(
        "demo",
        Config {
            log: true,
            log_collapsed: false,
            ..Config::default()
        },
    );
    let reports = directory.create_or_replace("reports", Config::default());

    sup.create("sync", "users", ticker("sync.users", 100, 50)).await?;
    sup.create("sync", "orders", ticker("sync.orders", 100, 70)).await?;
    sup.create("mail", "digest", ticker("mail.digest", 3, 40)).await?;
    reports.create("daily", "render", ticker("daily.render", 100, 90)).await?;

    let digest = sup.subscribe(Event::task_complete("mail", "digest"))?;
    if let Some(report) = digest.await?.report() {
        println!("digest finished: {} ({:?})", report.status, report.value::<u32>());
    }

    // Replaces the running job: the old one is cancelled and awaited first.
    tokio::time::sleep(Duration::from_millis(120)).await;
    sup.create("sync", "users", ticker("sync.users#2", 2, 30)).await?;

    let sync_drained = sup.subscribe(Event::category_complete("sync"))?;
    let cancelled = sup.cancel_category("sync").await?;
    println!("cancelled {} task(s) in sync", cancelled.len());
    sync_drained.await?;

    println!("categories left in demo: {:?}", sup.categories());
    directory.kill_all(true).await?;
    println!("all supervisors drained: {}", directory.is_empty());
    Ok(())
}

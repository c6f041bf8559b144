use clap::Parser;

use uptime_monitor::config::Args;
use uptime_monitor::daemon::Daemon;
use uptime_monitor::tracing;

// Single-threaded: the bus is never shared, and the local UTC offset can
// only be read while the process has one thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing::init_journald_or_stdout();

    let config = Args::parse().into_config()?;
    Daemon::new(config).run().await?;
    Ok(())
}

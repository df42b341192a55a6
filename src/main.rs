//! task-sync server binary.

use tracing_subscriber::EnvFilter;

use task_sync::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting task-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    api::serve(config).await
}

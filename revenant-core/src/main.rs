use std::sync::Arc;

use revenant_core::config::Config;
use revenant_core::control::{self, RunRegistry};
use revenant_core::runner::SessionRunner;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    tracing_subscriber::fmt().with_env_filter(config.tracing_filter()).init();

    let runner = Arc::new(SessionRunner::new(!config.debug));
    let run_registry = Arc::new(RunRegistry::default());

    info!(port = config.bridge_port, "starting revenant control protocol");
    control::serve(runner, run_registry, config.bridge_port).await?;

    Ok(())
}

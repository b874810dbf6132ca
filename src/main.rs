use anyhow::Result;
use clap::Parser;
use job_press::cli::{handle_command, JobPressCli};
use job_press::core::ConfigManager;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = JobPressCli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("job_press=info,rocket::server=off")),
        )
        .init();

    let config = ConfigManager::load()?;
    info!(
        "Environment: {}",
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string())
    );

    handle_command(cli, config).await
}

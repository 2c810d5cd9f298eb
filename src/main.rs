use clap::Parser;
use tracing_subscriber::EnvFilter;

use media_grabber::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("media_grabber=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::parse();
    media_grabber::run(config).await
}

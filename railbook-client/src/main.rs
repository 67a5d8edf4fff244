use clap::Parser;
use railbook_client::cli::{self, Cli};
use railbook_client::ClientContext;
use railbook_store::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railbook=info,railbook_client=info,railbook_order=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::debug!("Using backend {}", config.api.base_url);

    let ctx = ClientContext::from_config(&config)?;
    cli::run(cli, ctx).await
}

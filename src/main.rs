use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use values_schema::cache::ResultCache;
use values_schema::config::Config;
use values_schema::fetch::{FetcherConfig, HttpFetcher};
use values_schema::pipeline::Pipeline;
use values_schema::server::Server;
use values_schema::transform::ValuesSchemaTransformer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let fetcher = HttpFetcher::new(FetcherConfig::default())?;
    info!(origin = %fetcher.origin(), "fetching values files");

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(ResultCache::new()),
        Arc::new(fetcher),
        Arc::new(ValuesSchemaTransformer::default()),
    ));

    let server = Server::bind(config.bind_addr()).await?;
    info!(port = config.port, "server starting");

    server
        .run_until(
            move |req| {
                let pipeline = Arc::clone(&pipeline);
                async move { pipeline.handle(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;

    Ok(())
}

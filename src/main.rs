use anyhow::Result;
use url_shortener_core::{config, runtime, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_from_env()?;
    let _guard = telemetry::init(&config.log_level, &config.log_format)?;
    config.print_summary();

    runtime::run(config).await
}

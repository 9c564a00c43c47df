use booklog_mcp::config::AppConfig;
use booklog_mcp::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(&config.logging)?;

    booklog_mcp::interface::mcp::run(config).await
}

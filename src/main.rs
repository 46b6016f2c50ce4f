use binance_orderflow::{init_logging, BotConfig, LogSink, OrderFlowBot};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env overrides before reading the environment
    let _ = dotenvy::dotenv();
    init_logging();

    let config = BotConfig::from_env();
    let bot = OrderFlowBot::new(config, Arc::new(LogSink))?;

    let shutdown = bot.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    bot.run().await?;
    Ok(())
}

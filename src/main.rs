use std::sync::Arc;

use anyhow::Context;

use intake_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use intake_bot::config::BotConfig;
use intake_bot::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut config = BotConfig::from_env().context("reading configuration")?;

    eprintln!("📝 Intake Bot v{}", env!("CARGO_PKG_VERSION"));
    match &config.catalog_path {
        Some(path) => eprintln!("   Catalog: {}", path.display()),
        None => eprintln!("   Catalog: built-in"),
    }
    eprintln!("   Unexpected input: {:?}", config.unexpected_input);
    eprintln!(
        "   Session idle timeout: {}s",
        config.session_idle_timeout.as_secs()
    );

    // Set up channels
    let mut channels = ChannelManager::new();
    match config.telegram_token.take() {
        Some(token) => {
            channels.add(Arc::new(TelegramChannel::new(token)));
            eprintln!("   Channel: telegram\n");
        }
        None => {
            channels.add(Arc::new(CliChannel::new()));
            eprintln!("   Channel: cli (TELEGRAM_BOT_TOKEN not set)");
            eprintln!("   Type a message and press Enter. /photo <ref> simulates a photo.\n");
        }
    }

    let dispatcher =
        Dispatcher::from_config(&config, channels).context("loading intake catalog")?;
    dispatcher
        .channels()
        .health_check_all()
        .await
        .context("channel health check")?;

    dispatcher.run().await?;

    Ok(())
}

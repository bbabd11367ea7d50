use std::sync::Arc;

use adbot_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    adbot_core::logging::init("adbot")?;

    let cfg = Arc::new(Config::load()?);

    if let Err(e) = adbot_telegram::router::run_polling(cfg).await {
        tracing::error!("adbot stopped: {e:#}");
        return Err(e);
    }
    Ok(())
}

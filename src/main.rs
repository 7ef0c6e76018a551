// Untold server entry point: loads configuration, bootstraps or reloads the
// catalog, and serves the socket dispatcher until shutdown.

use tracing::{error, info};
use untold::config::Config;
use untold::crypto;
use untold::error::Result;
use untold::net;
use untold::session::Untold;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    info!(version = VERSION, "starting untold");

    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let key = crypto::ensure_key(&config.key_path())?;
    let with_tester = std::env::var("UNTOLD_WITH_TESTER").map(|v| v == "1").unwrap_or(false);

    let session = Untold::init(config.clone(), key, with_tester)?;
    info!(addr = %config.addr(), "session initialized, accepting connections");

    if let Err(err) = net::serve(config, session).await {
        error!(error = %err, "server stopped with an error");
        return Err(err);
    }

    info!("server stopped");
    Ok(())
}

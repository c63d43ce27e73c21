use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use olog::error::{OlogError, Result};
use olog::interface::QueryInterface;
use olog::persist::Persistor;
use olog::server;
use olog::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let persistor = Persistor::new(settings.persistence_mode())?;
    let interface = QueryInterface::new(Arc::new(persistor)).with_timeout(settings.query_timeout());
    let app = server::router(Arc::new(interface));

    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .map_err(|e| OlogError::Config(format!("cannot bind {}: {e}", settings.bind)))?;
    info!(bind = %settings.bind, database = %settings.database, "olog listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| OlogError::Invariant(format!("server stopped: {e}")))
}

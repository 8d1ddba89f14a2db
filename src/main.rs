use std::sync::Arc;

use chirpy::{
    build_api_route_filter, config::Config, handle_api_errors, store::Database,
    store::JsonStore, AppState, AuthConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "chirpy=info,warp=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let address = config.server_address()?;

    let store = JsonStore::open(&config.database_path).await?;
    if config.debug {
        info!("debug mode, starting from an empty database");
        store.reset().await?;
    }
    let db: Arc<dyn Database> = Arc::new(store);

    let auth_config = AuthConfig {
        token_secret: config.jwt_secret.clone(),
        polka_key: config.polka_key.clone(),
    };
    let state = AppState::new(auth_config, db, config.debug);

    let routes = build_api_route_filter(&state)
        .recover(handle_api_errors)
        .with(warp::trace::request());

    info!(
        %address,
        database = %config.database_path.display(),
        "serving chirpy"
    );
    warp::serve(routes).run(address).await;

    Ok(())
}

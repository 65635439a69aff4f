use std::sync::Arc;

use bitsa_server::admin::AdminList;
use bitsa_server::config::Config;
use bitsa_server::identity::AuthService;
use bitsa_server::store::PgStore;
use bitsa_server::{build_router, AppData, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;

    let db = sqlx::PgPool::connect(&config.database_url).await?;
    let store = PgStore::new(db);
    store.ensure_schema().await?;

    let state: AppState = Arc::new(AppData {
        store: Arc::new(store),
        identity: Arc::new(AuthService::new(&config)),
        admins: AdminList::new(&config.admin_emails),
    });

    let app = build_router(state);

    log::info!("club server starting on port {}", config.port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use accrual_client::AccrualApi;
use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{AccrualFanout, AuthApi, BalanceApi, OrderRegistryApi, OwnerLocks, SqliteDatabase};

use crate::{
    auth::TokenIssuer,
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        BalanceRoute,
        LoginRoute,
        MyOrdersRoute,
        RegisterRoute,
        SubmitOrderRoute,
        WithdrawRoute,
        WithdrawalsRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    ensure_database_dir(&config.database_url).await?;
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_db_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    } else {
        info!("🚀️ Skipping database migrations");
    }
    let accrual = AccrualApi::new(config.accrual.client_config())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // One fan-out (and therefore one cool-down gate) and one lock registry for every worker
    let fanout = AccrualFanout::new(accrual, config.accrual.fanout_policy());
    let locks = OwnerLocks::new();
    info!("🚀️ Starting loyalty server on {}", config.run_address);
    let srv = create_server_instance(config, db, fanout, locks)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    fanout: AccrualFanout<AccrualApi>,
    locks: OwnerLocks,
) -> Result<Server, ServerError> {
    let run_address = config.run_address.clone();
    let srv = HttpServer::new(move || {
        let auth_api = AuthApi::new(db.clone()).with_cost(config.bcrypt_cost);
        let registry_api = OrderRegistryApi::new(db.clone());
        let balance_api = BalanceApi::with_locks(db.clone(), fanout.clone(), locks.clone());
        let jwt_signer = TokenIssuer::new(&config.auth);
        let user_scope = web::scope("/api/user")
            .service(RegisterRoute::<SqliteDatabase>::new())
            .service(LoginRoute::<SqliteDatabase>::new())
            .service(SubmitOrderRoute::<SqliteDatabase, AccrualApi>::new())
            .service(MyOrdersRoute::<SqliteDatabase, AccrualApi>::new())
            .service(BalanceRoute::<SqliteDatabase, AccrualApi>::new())
            .service(WithdrawRoute::<SqliteDatabase, AccrualApi>::new())
            .service(WithdrawalsRoute::<SqliteDatabase, AccrualApi>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %r").log_target("lps::access_log"))
            .app_data(web::Data::new(auth_api))
            .app_data(web::Data::new(registry_api))
            .app_data(web::Data::new(balance_api))
            .app_data(web::Data::new(fanout.clone()))
            .app_data(web::Data::new(jwt_signer))
            .service(health)
            .service(user_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(run_address.as_str())?
    .run();
    Ok(srv)
}

/// The directory holding a file-backed SQLite database. `None` for in-memory databases and for files in the working
/// directory.
fn database_dir(url: &str) -> Option<PathBuf> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return None;
    }
    Path::new(path).parent().filter(|dir| !dir.as_os_str().is_empty()).map(Path::to_path_buf)
}

/// SQLite creates a missing database file, but not the directories above it.
async fn ensure_database_dir(url: &str) -> Result<(), ServerError> {
    if let Some(dir) = database_dir(url) {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ServerError::InitializeError(format!("Could not create the database directory {}. {e}", dir.display()))
        })?;
        debug!("🚀️ Database directory {} is ready", dir.display());
    }
    Ok(())
}

use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod error;
mod model;
mod models;
mod routes;
mod store;
mod utils;


use config::Config;
use db::init_db;
use routes::Limiters;
use store::{MySqlStore, PawnStore};
use utils::kood_index::KoodRegistry;

use api::upload::ImageStore;
use tracing::{error, info};
use tracing_appender::rolling;

const WARMUP_BATCH: usize = 500;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(
            config
                .log_level
                .parse::<tracing::Level>()
                .unwrap_or(tracing::Level::DEBUG),
        )
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections).await?;
    let store: Arc<dyn PawnStore> = Arc::new(MySqlStore::new(pool));
    let store = Data::from(store);

    let registry = Data::new(KoodRegistry::new());
    let images = Data::new(ImageStore::open(&config.upload_dir)?);
    let limiters = Limiters::from_config(&config)?;

    let warm_store = store.clone();
    let warm_registry = registry.clone();
    actix_web::rt::spawn(async move {
        let rows = warm_store.client_koods();
        if let Err(e) = warm_registry.clients.warmup(rows, WARMUP_BATCH).await {
            error!(error = %e, "Failed to warm up client kood index");
        }
    });

    let warm_store = store.clone();
    let warm_registry = registry.clone();
    actix_web::rt::spawn(async move {
        let rows = warm_store.employee_koods();
        if let Err(e) = warm_registry.employees.warmup(rows, WARMUP_BATCH).await {
            error!(error = %e, "Failed to warm up employee kood index");
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(store.clone())
            .app_data(registry.clone())
            .app_data(images.clone())
            .app_data(config_data.clone())
            .configure(error::configure_extractors)
            .configure(|cfg| routes::configure(cfg, &config_data, &limiters, &images))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}

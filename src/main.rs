use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::executor_config::{ExecutorConfig, ProviderConfig, ServerConfig};
use crate::logger::init_logger;
use crate::resilience::concurrency_limiter::ConcurrencyLimiter;
use crate::resilience::retry_policy::RetryPolicy;
use crate::resilience::timeout_guard::TimeoutGuard;
use crate::services::ai_service::OpenAiService;
use crate::services::metrics_service::ErrorMetrics;
use crate::services::operation_service::OperationService;
use crate::services::task_executor::TaskExecutor;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod resilience;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(server: &ServerConfig) -> Result<Pool<Sqlite>> {
    let db_url = match &server.database_url {
        Some(url) => url.clone(),
        None => {
            // ./data/operations.db
            std::fs::create_dir_all("data").context("No se pudo crear directorio 'data'")?;
            let db_path = std::env::current_dir()
                .context("No se pudo obtener el current_dir")?
                .join("data")
                .join("operations.db");
            format!("sqlite:{}", db_path.to_string_lossy())
        }
    };

    log::info!("Conectando a SQLite en {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)
        .context("DATABASE_URL inválida")?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let server = ServerConfig::from_env();
    let executor_cfg = ExecutorConfig::from_env();
    log::info!("Configuración del ejecutor: {:?}", executor_cfg);

    let db_pool = setup_database(&server)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{e:?}")))?;

    let operation_service = OperationService::new(db_pool.clone());
    operation_service
        .run_migrations()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{e:?}")))?;

    // Un único limitador para todo el proceso
    let limiter = ConcurrencyLimiter::new(executor_cfg.max_concurrent_calls);
    let executor = TaskExecutor::new(
        operation_service.clone(),
        limiter,
        RetryPolicy::from_config(&executor_cfg),
        TimeoutGuard::from_config(&executor_cfg),
        Arc::new(OpenAiService::new(ProviderConfig::from_env())),
        ErrorMetrics::new(),
    );

    log::info!("Levantando servidor en {}:{}", server.host, server.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(operation_service.clone()))
            .app_data(web::Data::new(executor.clone()))
            .configure(app::init_app)
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}

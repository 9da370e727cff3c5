use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod handlers;
mod lifecycle;
mod message;
mod models;
mod multipart;
mod routes;
mod state;
mod store;
mod utils;


use crate::config::Config;
use crate::error::AppError;
use crate::handlers::share_handler::not_found;
use crate::state::AppState;

const JSON_LIMIT: usize = 15 * 1024 * 1024;
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state, body limits and routes.
pub(crate) fn configure_app(cfg: &mut web::ServiceConfig, state: web::Data<AppState>) {
    let payload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    cfg.app_data(state)
        .app_data(web::PayloadConfig::new(payload_limit))
        .app_data(
            web::JsonConfig::default()
                .limit(JSON_LIMIT)
                .error_handler(|err, _req| {
                    AppError::BadRequest(format!("JSON inválido: {err}")).into()
                }),
        )
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            AppError::BadRequest(format!("Parámetros inválidos: {err}")).into()
        }))
        .configure(routes::routes::config_with_api_prefix);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;
    info!("Starting with {config:?}");

    let bind = (config.host.clone(), config.port);
    let state = AppState::connect(config).await.map_err(|e| {
        error!("Could not connect to the media store: {e}");
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;
    let state = web::Data::new(state);

    info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(|cfg| configure_app(cfg, state))
            .default_service(web::to(not_found))
    })
    .bind(bind)?
    .run()
    .await
}

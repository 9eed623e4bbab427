use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use backend::config::AppConfig;
use backend::error::StartupError;
use backend::routes::configure_routes;
use backend::service::DiagnosisService;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(startup_failed)?;
    log::debug!("Resolved configuration: {:?}", config);

    // No listener is bound until the model has loaded.
    let service = DiagnosisService::from_config(&config)
        .await
        .map_err(startup_failed)?;
    let service = web::Data::new(service);

    let upload_dir = config.storage.upload_dir.clone();
    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(service.clone())
            .configure(|cfg| configure_routes(cfg, upload_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn startup_failed(err: StartupError) -> std::io::Error {
    log::error!("Startup aborted: {}", err);
    std::io::Error::other(err.to_string())
}

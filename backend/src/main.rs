mod assessment;
mod auth;
mod config;
mod db;
mod history;
mod inference;
mod persistence;
mod routes;
mod stats;
mod workflow;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use auth::jwt::JwtService;
use auth::middleware::IdentityMiddleware;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use config::{AppConfig, StoreConfig};
use db::assessment_store::AssessmentStore;
use db::dynamodb_repository::DynamoDbRepository;
use db::memory_repository::InMemoryRepository;
use inference::client::HttpPredictionClient;
use persistence::gate::PersistenceGate;
use routes::configure_routes;
use std::sync::Arc;
use workflow::AssessmentWorkflow;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let store: Arc<dyn AssessmentStore> = match &config.store {
        StoreConfig::Memory => {
            log::warn!("Using in-memory assessment store; history is lost on restart");
            Arc::new(InMemoryRepository::new())
        }
        StoreConfig::DynamoDb { table } => {
            let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
            log::info!("Using DynamoDB table {}", table);
            Arc::new(DynamoDbRepository::new(
                DynamoDbClient::new(&aws_config),
                table.clone(),
            ))
        }
    };

    let predictor = HttpPredictionClient::new(&config.prediction_url).map_err(|e| {
        log::error!("Failed to create prediction client: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    log::info!("Prediction service endpoint: {}", predictor.endpoint());

    let workflow = web::Data::new(AssessmentWorkflow::new(
        Arc::new(predictor),
        PersistenceGate::new(store),
    ));
    let history_limits = web::Data::new(config.history.clone());
    let identity_middleware = IdentityMiddleware::new(JwtService::new(&config.jwt_secret));

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(identity_middleware.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(workflow.clone())
            .app_data(history_limits.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}

mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod rules;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderName, HeaderValue, Method};
use config::Config;
use db::{DBClient, Store};
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use service::{
    application_service::ApplicationService,
    job_service::JobService,
    notification_service::NotificationService,
    oauth::{IdTokenVerifier, JwksVerifier},
    push::{ExpoPushGateway, PushGateway},
    rating_service::RatingService,
    storage::{LocalStorage, ObjectStorage},
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn Store>,
    // Services
    pub application_service: Arc<ApplicationService>,
    pub rating_service: Arc<RatingService>,
    pub notification_service: Arc<NotificationService>,
    pub job_service: Arc<JobService>,
    // Integrations
    pub storage: Arc<dyn ObjectStorage>,
    pub google_verifier: Arc<dyn IdTokenVerifier>,
    pub apple_verifier: Arc<dyn IdTokenVerifier>,
}

impl AppState {
    pub fn new(
        config: Config,
        db_client: Arc<dyn Store>,
        push_gateway: Arc<dyn PushGateway>,
        storage: Arc<dyn ObjectStorage>,
        google_verifier: Arc<dyn IdTokenVerifier>,
        apple_verifier: Arc<dyn IdTokenVerifier>,
    ) -> Self {
        let notification_service = Arc::new(NotificationService::new(db_client.clone(), push_gateway));

        let application_service = Arc::new(ApplicationService::new(
            db_client.clone(),
            notification_service.clone(),
        ));
        let rating_service = Arc::new(RatingService::new(
            db_client.clone(),
            notification_service.clone(),
        ));
        let job_service = Arc::new(JobService::new(
            db_client.clone(),
            notification_service.clone(),
        ));

        Self {
            env: config,
            db_client,
            application_service,
            rating_service,
            notification_service,
            job_service,
            storage,
            google_verifier,
            apple_verifier,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("connected to the database");
            pool
        }
        Err(err) => {
            tracing::error!("failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let db_client: Arc<dyn Store> = Arc::new(DBClient::new(pool));
    let push_gateway = Arc::new(ExpoPushGateway::new(
        config.expo_push_url.clone(),
        config.expo_access_token.clone(),
    ));
    let storage = Arc::new(LocalStorage::new(
        config.storage_root.clone(),
        config.storage_public_url.clone(),
    ));
    let google_verifier = Arc::new(JwksVerifier::google(config.google_client_ids.clone()));
    let apple_verifier = Arc::new(JwksVerifier::apple(config.apple_client_ids.clone()));

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE, HeaderName::from_static("auth")])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(
        config.clone(),
        db_client,
        push_gateway,
        storage,
        google_verifier,
        apple_verifier,
    ));

    let app = create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", err);
    }
}

//! HTTP surface over the tile pipeline. Every route is served both at the
//! root and under `/api`.

pub mod dto;
pub mod handlers;

use actix_web::{error::InternalError, middleware, web, App, HttpServer, ResponseError};

use crate::{error::ScrollError, pipeline::TileGenerator};

/// Predecessor tiles arrive inline as data URLs.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub struct AppState {
    pub generator: TileGenerator,
    pub environment: String,
}

impl AppState {
    pub fn new(generator: TileGenerator, environment: impl Into<String>) -> Self {
        Self {
            generator,
            environment: environment.into(),
        }
    }
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::generate_next_image)
        .service(handlers::models)
        .service(handlers::health)
        .service(handlers::reset_session);
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            let error = ScrollError::InvalidInput(err.to_string());
            let response = error.error_response();
            InternalError::from_response(err, response).into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(web::scope("/api").configure(routes))
        .configure(routes);
}

pub async fn run(state: AppState, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(state);
    log::info!("🌐 Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "content-type")),
            )
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

use actix_web::{get, http::StatusCode, post, web, HttpResponse, ResponseError};
use chrono::Utc;

use super::dto::{
    ErrorBody, GenerateNextImageRequest, GenerateNextImageResponse, HealthResponse,
    ModelsResponse, ServiceStatus, SessionResetResponse,
};
use super::AppState;
use crate::error::ScrollError;

impl ResponseError for ScrollError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScrollError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::from_error(self))
    }
}

#[post("/generate-next-image")]
pub async fn generate_next_image(
    state: web::Data<AppState>,
    body: web::Json<GenerateNextImageRequest>,
) -> Result<HttpResponse, ScrollError> {
    let body = body.into_inner();
    let debug = body.debug_mode;
    let original_prompt = body.current_prompt.clone();

    log::info!(
        "🖼️  Tile requested (continuation: {}, model: {}, session: {})",
        body.previous_image.is_some(),
        body.model_name.as_deref().unwrap_or("auto"),
        body.session_id.as_deref().unwrap_or("new")
    );

    let outcome = state.generator.generate(body.into_tile_request()).await?;
    Ok(HttpResponse::Ok().json(GenerateNextImageResponse::from_outcome(
        outcome,
        debug,
        original_prompt,
    )))
}

#[get("/models")]
pub async fn models(state: web::Data<AppState>) -> HttpResponse {
    let registry = state.generator.registry();
    HttpResponse::Ok().json(ModelsResponse {
        available_models: registry.ids(),
        default_model: registry.default_model().id.clone(),
        model_configs: registry
            .profiles()
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect(),
    })
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let backends = state.generator.backends();
    let registry = state.generator.registry();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        environment: state.environment.clone(),
        services: ServiceStatus {
            replicate: backends.image().is_configured(),
            gemini: backends.text().is_configured(),
        },
        available_models: registry.ids(),
        default_model: registry.default_model().id.clone(),
    })
}

#[post("/sessions/{session_id}/reset")]
pub async fn reset_session(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let session_id = path.into_inner();
    let reset = state.generator.sessions().reset(&session_id);
    log::info!("🔄 Session {} reset (had theme: {})", session_id, reset);
    HttpResponse::Ok().json(SessionResetResponse { session_id, reset })
}

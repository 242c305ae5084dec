//! Tile orchestration: prompt evolution, strategy planning and execution.

pub mod prompts;
pub mod session;
pub mod strategy;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    backends::Backends,
    config::AppConfig,
    error::{Result, ScrollError},
    logger,
    models::{ImageGenerationRequest, ModelProfile, ModelRegistry},
    outpaint::{Cropper, OutpaintBuilder, SliceSpec},
};

pub use session::{PromptChain, SessionStore};
pub use strategy::{plan, GenerationStrategy};

pub const MIN_INFERENCE_STEPS: u32 = 1;
pub const MAX_INFERENCE_STEPS: u32 = 50;

#[derive(Debug, Clone, Default)]
pub struct TileRequest {
    /// URL or data URL of the tile directly above the one requested.
    pub previous_image: Option<String>,
    pub current_prompt: Option<String>,
    pub original_user_prompt: Option<String>,
    pub model_name: Option<String>,
    pub inference_steps: Option<u32>,
    pub session_id: Option<String>,
}

impl TileRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_previous_image(mut self, reference: impl Into<String>) -> Self {
        self.previous_image = Some(reference.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.current_prompt = Some(prompt.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.original_user_prompt = Some(theme.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.inference_steps = Some(steps);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub strategy: String,
    pub model: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    fn new(strategy: &GenerationStrategy, elapsed: Duration, error: Option<&ScrollError>) -> Self {
        AttemptRecord {
            strategy: strategy.kind().to_string(),
            model: strategy.model().id.clone(),
            succeeded: error.is_none(),
            error: error.map(|e| e.to_string()),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// A generated tile and how it came to be.
#[derive(Debug, Clone)]
pub struct TileOutcome {
    pub image_url: String,
    /// Scene description the tile depicts.
    pub prompt: String,
    /// Templated prompt actually sent to the image backend.
    pub final_prompt: String,
    pub original_user_prompt: Option<String>,
    pub evolved_prompt: Option<String>,
    pub evolution_fell_back: bool,
    pub requested_model: String,
    pub model_used: String,
    pub model_profile: ModelProfile,
    pub strategy: &'static str,
    /// Wall-clock time of the successful backend call.
    pub generation_time_ms: u64,
    pub total_time_ms: u64,
    pub width: u32,
    pub height: u32,
    pub is_initial: bool,
    pub session_id: Option<String>,
    pub slice: Option<SliceSpec>,
    pub attempts: Vec<AttemptRecord>,
    pub timestamp: DateTime<Utc>,
}

struct TileContext<'a> {
    scene: Option<&'a str>,
    previous: Option<&'a str>,
    requested_id: &'a str,
    steps_override: Option<u32>,
    seed: Option<u32>,
}

struct Executed {
    image_url: String,
    final_prompt: String,
    backend_elapsed: Duration,
    slice: Option<SliceSpec>,
}

pub struct TileGenerator {
    backends: Backends,
    registry: ModelRegistry,
    builder: OutpaintBuilder,
    cropper: Cropper,
    sessions: SessionStore,
}

impl TileGenerator {
    pub fn new(backends: Backends, registry: ModelRegistry, config: &AppConfig) -> Self {
        let builder = OutpaintBuilder::new(
            config.image_width,
            config.image_height,
            config.slice.clone(),
        );
        let cropper = Cropper::new(backends.source().clone());
        Self {
            backends,
            registry,
            builder,
            cropper,
            sessions: SessionStore::new(config.session_ttl),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub async fn generate(&self, request: TileRequest) -> Result<TileOutcome> {
        let _timer = logger::timer("tile generation");
        let started = Instant::now();

        let previous = non_empty(request.previous_image);
        let is_initial = previous.is_none();
        let current = non_empty(request.current_prompt);
        let explicit_theme = non_empty(request.original_user_prompt);
        let requested_name = non_empty(request.model_name);
        let steps_override = request
            .inference_steps
            .map(|s| s.clamp(MIN_INFERENCE_STEPS, MAX_INFERENCE_STEPS));

        let session_id = non_empty(request.session_id)
            .or_else(|| is_initial.then(|| Uuid::new_v4().to_string()));
        let stored_theme = session_id.as_deref().and_then(|id| self.sessions.theme(id));
        let mut chain = PromptChain::new(explicit_theme.clone().or(stored_theme.clone()));

        let requested = match requested_name.as_deref() {
            Some(name) => self.registry.resolve(Some(name)),
            None if !is_initial => self
                .registry
                .first_inpainting()
                .unwrap_or_else(|| self.registry.default_model()),
            None => self.registry.default_model(),
        };
        let requested_model = requested_name.unwrap_or_else(|| requested.id.clone());

        let (scene, evolution) = if is_initial {
            // A first tile restarts the scroll, so the stored theme only fills in a missing prompt.
            chain = PromptChain::new(explicit_theme.clone());
            let scene = current.or(explicit_theme).or(stored_theme);
            if let Some(scene) = &scene {
                chain.set_theme_once(scene);
            }
            if let (Some(id), Some(theme)) = (&session_id, chain.theme()) {
                self.sessions.begin(id, theme);
            }
            (scene, None)
        } else {
            if let (Some(id), Some(theme), None) = (&session_id, &explicit_theme, &stored_theme) {
                self.sessions.begin(id, theme);
            }
            let base = current
                .or_else(|| chain.theme().map(str::to_string))
                .unwrap_or_else(|| prompts::DEFAULT_SCENE.to_string());
            let evolution =
                prompts::evolve(self.backends.text().as_ref(), &base, chain.theme()).await;
            chain.advance(evolution.evolved.clone());
            (Some(evolution.evolved.clone()), Some(evolution))
        };

        let context = TileContext {
            scene: scene.as_deref(),
            previous: previous.as_deref(),
            requested_id: &requested.id,
            steps_override,
            seed: is_initial.then(random_seed),
        };

        let strategies = plan(&self.registry, requested, !is_initial);
        let mut attempts = Vec::with_capacity(strategies.len());
        let mut last_error = None;

        for strategy in &strategies {
            let attempt_started = Instant::now();
            log::info!("🚀 Trying {} strategy", strategy);

            match self.execute(strategy, &context).await {
                Ok(executed) => {
                    attempts.push(AttemptRecord::new(strategy, attempt_started.elapsed(), None));
                    log::info!(
                        "✅ Tile ready via {} in {}ms",
                        strategy,
                        executed.backend_elapsed.as_millis()
                    );
                    let (width, height) = self.builder.canvas_size();
                    return Ok(TileOutcome {
                        image_url: executed.image_url,
                        prompt: scene
                            .clone()
                            .unwrap_or_else(|| prompts::DEFAULT_SCENE.to_string()),
                        final_prompt: executed.final_prompt,
                        original_user_prompt: chain.theme().map(str::to_string),
                        evolved_prompt: chain.evolved().map(str::to_string),
                        evolution_fell_back: evolution.map(|e| e.fell_back).unwrap_or(false),
                        requested_model,
                        model_used: strategy.model().id.clone(),
                        model_profile: strategy.model().clone(),
                        strategy: strategy.kind(),
                        generation_time_ms: executed.backend_elapsed.as_millis() as u64,
                        total_time_ms: started.elapsed().as_millis() as u64,
                        width,
                        height,
                        is_initial,
                        session_id,
                        slice: executed.slice,
                        attempts,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    log::warn!("⚠️  {} strategy failed: {}", strategy, e);
                    attempts.push(AttemptRecord::new(strategy, attempt_started.elapsed(), Some(&e)));
                    let recoverable = e.is_recoverable();
                    last_error = Some(e);
                    if !recoverable {
                        break;
                    }
                }
            }
        }

        let details = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no generation strategy available".to_string());
        log::error!("❌ Every strategy failed: {}", details);
        Err(ScrollError::GenerationFailed(details))
    }

    async fn execute(
        &self,
        strategy: &GenerationStrategy,
        context: &TileContext<'_>,
    ) -> Result<Executed> {
        let model = strategy.model();
        let scene = context.scene.unwrap_or(prompts::DEFAULT_SCENE);

        match strategy {
            GenerationStrategy::Initial(_) => {
                let prompt = prompts::initial_prompt(context.scene);
                let mut request = self.image_request(model, prompt, context);
                if let Some(seed) = context.seed {
                    request = request.with_seed(seed);
                }
                self.call_backend(request, None).await
            }
            GenerationStrategy::FastMode(_) => {
                let request = self.image_request(model, prompts::contextual_cues(scene), context);
                self.call_backend(request, None).await
            }
            GenerationStrategy::Inpaint(_) => {
                let previous = context.previous.ok_or_else(|| {
                    ScrollError::ImageProcessingError("no predecessor to outpaint from".into())
                })?;
                let bytes = self.backends.source().load(previous).await?;

                let builder = self.builder.clone();
                let ((canvas, mask), spec) = tokio::task::spawn_blocking(move || {
                    let inputs = builder.build_from_bytes(&bytes)?;
                    Ok::<_, ScrollError>((inputs.to_data_urls()?, inputs.spec))
                })
                .await
                .map_err(|e| ScrollError::ImageProcessingError(format!("canvas task failed: {}", e)))??;

                let request = self
                    .image_request(model, prompts::continuation_prompt(scene), context)
                    .with_inpainting(canvas, mask);
                let mut executed = self.call_backend(request, Some(spec)).await?;
                executed.image_url = self.cropper.crop_reference(&executed.image_url, &spec).await;
                Ok(executed)
            }
        }
    }

    fn image_request(
        &self,
        model: &ModelProfile,
        prompt: String,
        context: &TileContext<'_>,
    ) -> ImageGenerationRequest {
        let (width, height) = self.builder.canvas_size();
        let steps = match context.steps_override {
            Some(steps) if model.id == context.requested_id => steps,
            _ => model.steps,
        };
        ImageGenerationRequest::new(&model.name, prompt, width, height)
            .with_sampling(steps, model.guidance_scale)
    }

    async fn call_backend(
        &self,
        request: ImageGenerationRequest,
        slice: Option<SliceSpec>,
    ) -> Result<Executed> {
        let final_prompt = request.prompt.clone();
        let started = Instant::now();
        let response = self.backends.image().generate(request).await?;
        let backend_elapsed = started.elapsed();
        let image_url = response
            .first()
            .map(str::to_string)
            .ok_or_else(|| ScrollError::ResponseError("No images generated".into()))?;
        Ok(Executed {
            image_url,
            final_prompt,
            backend_elapsed,
            slice,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn random_seed() -> u32 {
    let bytes = Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::{StubImageBackend, StubTextBackend, STUB_TILE_COLOR};
    use crate::backends::HttpImageSource;
    use crate::outpaint::raster;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Arc;

    const FALLBACK: &str = "The landscape continues with new mysteries revealed.";

    fn generator(image: &Arc<StubImageBackend>, text: &Arc<StubTextBackend>) -> TileGenerator {
        let config = AppConfig::new().with_canvas(256, 192);
        let source = Arc::new(HttpImageSource::new(Duration::from_secs(1)).unwrap());
        TileGenerator::new(
            Backends::new(image.clone(), text.clone(), source),
            ModelRegistry::default(),
            &config,
        )
    }

    fn predecessor(width: u32, height: u32) -> String {
        let tile = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        raster::png_data_url(&DynamicImage::ImageRgb8(tile)).unwrap()
    }

    #[tokio::test]
    async fn test_initial_tile_uses_seeded_text_to_image() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("unused"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(TileRequest::new().with_prompt("a coral atoll"))
            .await
            .unwrap();

        assert!(outcome.is_initial);
        assert_eq!(outcome.strategy, "initial");
        assert_eq!(outcome.model_used, "flux-schnell");
        assert_eq!(outcome.prompt, "a coral atoll");
        assert_eq!(outcome.original_user_prompt.as_deref(), Some("a coral atoll"));
        assert!(outcome.slice.is_none());

        let requests = image.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].seed.is_some());
        assert!(!requests[0].is_inpainting());
        assert!(requests[0].prompt.contains("a coral atoll"));
        assert!(text.prompts().is_empty());

        let session = outcome.session_id.unwrap();
        assert_eq!(generator.sessions().theme(&session).as_deref(), Some("a coral atoll"));
    }

    #[tokio::test]
    async fn test_text_timeout_still_reaches_image_backend() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::timing_out());
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(
                TileRequest::new()
                    .with_previous_image(predecessor(256, 192))
                    .with_prompt("a coral atoll"),
            )
            .await
            .unwrap();

        let expected = format!("a coral atoll. {}", FALLBACK);
        assert_eq!(outcome.evolved_prompt.as_deref(), Some(expected.as_str()));
        assert!(outcome.evolution_fell_back);
        assert_eq!(outcome.strategy, "inpaint");
        assert_eq!(outcome.requested_model, "flux-fill-pro");
        assert_eq!(outcome.model_used, "flux-fill-pro");

        let requests = image.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_inpainting());
        assert!(requests[0].prompt.contains(&expected));
    }

    #[tokio::test]
    async fn test_inpainted_tile_is_cropped_by_slice() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("a lagoon opens to the south"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(
                TileRequest::new()
                    .with_previous_image(predecessor(256, 192))
                    .with_prompt("a coral atoll"),
            )
            .await
            .unwrap();

        let spec = outcome.slice.unwrap();
        assert_eq!(spec.slice_height, 67);
        assert_eq!(outcome.prompt, "a lagoon opens to the south");

        let tile = raster::decode(&raster::parse_data_url(&outcome.image_url).unwrap()).unwrap();
        assert_eq!((tile.width(), tile.height()), (256, 192 - 67));
        assert_eq!(tile.to_rgb8().get_pixel(0, 0), &Rgb(STUB_TILE_COLOR));
    }

    #[tokio::test]
    async fn test_text_only_model_takes_fast_path() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("dunes ripple into salt flats"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(
                TileRequest::new()
                    .with_previous_image(predecessor(256, 192))
                    .with_prompt("a desert")
                    .with_model("flux-schnell-lora"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "fast");
        assert_eq!(outcome.requested_model, "flux-schnell-lora");
        assert_eq!(outcome.model_used, "flux-schnell-lora");
        assert!(outcome.slice.is_none());

        let requests = image.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].is_inpainting());
        assert_eq!(requests[0].model, "black-forest-labs/flux-schnell-lora");
        assert!(requests[0]
            .prompt
            .starts_with("Continuing the scene from above, dunes ripple into salt flats."));
    }

    #[tokio::test]
    async fn test_inpaint_failure_falls_back_to_fast_mode() {
        let image = Arc::new(StubImageBackend::failing(&["flux-fill-pro"]));
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(TileRequest::new().with_previous_image(predecessor(256, 192)))
            .await
            .unwrap();

        assert_eq!(outcome.requested_model, "flux-fill-pro");
        assert_eq!(outcome.model_used, "flux-schnell");
        assert_eq!(outcome.strategy, "fast");
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].succeeded);
        assert!(outcome.attempts[1].succeeded);
        assert_eq!(image.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_degenerate_predecessor_falls_back_to_fast_mode() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(TileRequest::new().with_previous_image(predecessor(256, 2)))
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "fast");
        assert!(outcome.attempts[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Degenerate geometry"));
        assert_eq!(image.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_predecessor_falls_back_to_fast_mode() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(
                TileRequest::new().with_previous_image("data:image/png;base64,bm90IGFuIGltYWdl"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.strategy, "fast");
        assert_eq!(outcome.model_used, "flux-schnell");
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_generation_failed() {
        let image = Arc::new(StubImageBackend::failing(&[
            "flux-schnell",
            "flux-fill-pro",
            "flux-schnell-lora",
        ]));
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        let err = generator
            .generate(TileRequest::new().with_previous_image(predecessor(256, 192)))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrollError::GenerationFailed(_)));
        assert!(err.to_string().contains("flux-schnell is down"));
    }

    #[tokio::test]
    async fn test_rejected_credential_stops_fallbacks() {
        let image = Arc::new(StubImageBackend::rejecting());
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        let err = generator
            .generate(TileRequest::new().with_previous_image(predecessor(256, 192)))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrollError::GenerationFailed(_)));
        assert!(err.to_string().contains("401"));
        assert_eq!(image.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_step_override_is_clamped_and_scoped() {
        let image = Arc::new(StubImageBackend::failing(&["flux-fill-pro"]));
        let text = Arc::new(StubTextBackend::replying("a canyon widens"));
        let generator = generator(&image, &text);

        generator
            .generate(
                TileRequest::new()
                    .with_previous_image(predecessor(256, 192))
                    .with_steps(500),
            )
            .await
            .unwrap();

        let requests = image.requests();
        assert_eq!(requests[0].num_inference_steps, MAX_INFERENCE_STEPS);
        assert_eq!(requests[1].num_inference_steps, 4);

        let image = Arc::new(StubImageBackend::new());
        let generator = self::generator(&image, &text);
        generator
            .generate(TileRequest::new().with_prompt("a delta").with_steps(0))
            .await
            .unwrap();
        assert_eq!(image.requests()[0].num_inference_steps, MIN_INFERENCE_STEPS);
    }

    #[tokio::test]
    async fn test_session_theme_guides_continuations() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("reef walls drop into blue water"));
        let generator = generator(&image, &text);

        let first = generator
            .generate(TileRequest::new().with_prompt("a coral atoll"))
            .await
            .unwrap();
        let session = first.session_id.unwrap();

        let next = generator
            .generate(
                TileRequest::new()
                    .with_previous_image(predecessor(256, 192))
                    .with_prompt("a shallow lagoon")
                    .with_session(session.as_str()),
            )
            .await
            .unwrap();

        assert_eq!(next.original_user_prompt.as_deref(), Some("a coral atoll"));
        assert_eq!(next.session_id.as_deref(), Some(session.as_str()));
        assert!(text.prompts()[0].contains("a coral atoll"));
        assert!(text.prompts()[0].contains("a shallow lagoon"));
    }

    #[tokio::test]
    async fn test_unknown_model_is_reported_truthfully() {
        let image = Arc::new(StubImageBackend::new());
        let text = Arc::new(StubTextBackend::replying("unused"));
        let generator = generator(&image, &text);

        let outcome = generator
            .generate(TileRequest::new().with_prompt("tundra").with_model("sdxl"))
            .await
            .unwrap();

        assert_eq!(outcome.requested_model, "sdxl");
        assert_eq!(outcome.model_used, "flux-schnell");
    }
}

use dreamscroll::{
    logger::{self, LoggerConfig},
    server::{self, AppState},
    AppConfig, Backends, ModelRegistry, TileGenerator,
};

const DEFAULT_PORT: u16 = 3001;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(LoggerConfig::from_env())?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        log::error!("❌ Invalid configuration: {}", e);
        return Err(e.into());
    }
    logger::log_config_info(&config);

    let backends = match Backends::from_config(&config) {
        Ok(backends) => {
            log::info!("✅ Backends initialized");
            backends
        }
        Err(e) => {
            log::error!("❌ Failed to initialize backends: {}", e);
            return Err(e.into());
        }
    };

    let mut registry = ModelRegistry::default();
    if let Some(model) = &config.default_model {
        registry = registry.with_default(model);
    }

    let port = config.port.unwrap_or(DEFAULT_PORT);
    let generator = TileGenerator::new(backends, registry, &config);

    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), port);
    server::run(AppState::new(generator, config.environment.clone()), port).await?;

    log::info!("👋 Server stopped");
    Ok(())
}

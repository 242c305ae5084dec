use std::env;
use std::time::Duration;

use crate::error::{Result, ScrollError};

pub const DEFAULT_IMAGE_WIDTH: u32 = 1024;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientCurve {
    Linear,
    Exponential,
}

impl GradientCurve {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(GradientCurve::Linear),
            "exponential" | "quadratic" => Some(GradientCurve::Exponential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GradientCurve::Linear => "linear",
            GradientCurve::Exponential => "exponential",
        }
    }
}

/// Geometry knobs for the bottom band reused from a predecessor tile.
#[derive(Debug, Clone)]
pub struct SliceSettings {
    pub ratio: f64,
    pub max_slice_height: u32,
    pub max_ratio: f64,
    pub gradient_ratio: f64,
    pub max_gradient_zone: u32,
    pub gradient_curve: GradientCurve,
    pub canvas_fill: [u8; 3],
}

impl Default for SliceSettings {
    fn default() -> Self {
        SliceSettings {
            ratio: 0.35,
            max_slice_height: 384,
            max_ratio: 0.5,
            gradient_ratio: 0.4,
            max_gradient_zone: 60,
            gradient_curve: GradientCurve::Linear,
            canvas_fill: [128, 128, 128],
        }
    }
}

impl SliceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        SliceSettings {
            ratio: env_parse("SLICE_RATIO").unwrap_or(defaults.ratio),
            max_slice_height: env_parse("MAX_SLICE_HEIGHT").unwrap_or(defaults.max_slice_height),
            max_ratio: env_parse("MAX_SLICE_RATIO").unwrap_or(defaults.max_ratio),
            gradient_ratio: env_parse("GRADIENT_RATIO").unwrap_or(defaults.gradient_ratio),
            max_gradient_zone: env_parse("MAX_GRADIENT_ZONE")
                .unwrap_or(defaults.max_gradient_zone),
            gradient_curve: env::var("GRADIENT_CURVE")
                .ok()
                .and_then(|v| GradientCurve::parse(&v))
                .unwrap_or(defaults.gradient_curve),
            canvas_fill: env::var("CANVAS_FILL")
                .ok()
                .and_then(|v| parse_fill(&v))
                .unwrap_or(defaults.canvas_fill),
        }
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_max_slice_height(mut self, max_slice_height: u32) -> Self {
        self.max_slice_height = max_slice_height;
        self
    }

    pub fn with_max_ratio(mut self, max_ratio: f64) -> Self {
        self.max_ratio = max_ratio;
        self
    }

    pub fn with_gradient(mut self, ratio: f64, max_zone: u32, curve: GradientCurve) -> Self {
        self.gradient_ratio = ratio;
        self.max_gradient_zone = max_zone;
        self.gradient_curve = curve;
        self
    }

    pub fn with_canvas_fill(mut self, rgb: [u8; 3]) -> Self {
        self.canvas_fill = rgb;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v > 0.0 && v < 1.0;
        if !in_unit(self.ratio) {
            return Err(ScrollError::ConfigError(format!(
                "slice ratio must be in (0, 1), got {}",
                self.ratio
            )));
        }
        if !in_unit(self.max_ratio) {
            return Err(ScrollError::ConfigError(format!(
                "max slice ratio must be in (0, 1), got {}",
                self.max_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.gradient_ratio) {
            return Err(ScrollError::ConfigError(format!(
                "gradient ratio must be in [0, 1], got {}",
                self.gradient_ratio
            )));
        }
        if self.max_slice_height == 0 {
            return Err(ScrollError::ConfigError(
                "max slice height must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub generation: Duration,
    pub text: Duration,
    pub download: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        TimeoutSettings {
            generation: Duration::from_millis(60_000),
            text: Duration::from_millis(30_000),
            download: Duration::from_millis(30_000),
        }
    }
}

impl TimeoutSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            env_parse::<u64>(key)
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };
        TimeoutSettings {
            generation: millis("GENERATION_TIMEOUT", defaults.generation),
            text: millis("TEXT_TIMEOUT", defaults.text),
            download: millis("DOWNLOAD_TIMEOUT", defaults.download),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        ReplicateConfig {
            api_token: None,
            base_url: "https://api.replicate.com/v1".to_string(),
            poll_interval: Duration::from_millis(1_000),
        }
    }
}

impl ReplicateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        ReplicateConfig {
            api_token: env::var("REPLICATE_API_TOKEN").ok().filter(|t| !t.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        GeminiConfig {
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            base_url: defaults.base_url,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: Option<u16>,
    pub environment: String,
    pub image_width: u32,
    pub image_height: u32,
    pub default_model: Option<String>,
    pub session_ttl: Duration,
    pub slice: SliceSettings,
    pub timeouts: TimeoutSettings,
    pub replicate: ReplicateConfig,
    pub gemini: GeminiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            port: None,
            environment: "development".to_string(),
            image_width: DEFAULT_IMAGE_WIDTH,
            image_height: DEFAULT_IMAGE_HEIGHT,
            default_model: None,
            session_ttl: Duration::from_secs(60 * 60),
            slice: SliceSettings::default(),
            timeouts: TimeoutSettings::default(),
            replicate: ReplicateConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        AppConfig {
            port: env_parse("PORT"),
            environment: env::var("APP_ENV")
                .or_else(|_| env::var("NODE_ENV"))
                .unwrap_or(defaults.environment),
            image_width: env_parse("IMAGE_WIDTH").unwrap_or(defaults.image_width),
            image_height: env_parse("IMAGE_HEIGHT").unwrap_or(defaults.image_height),
            default_model: env::var("DEFAULT_MODEL").ok().filter(|m| !m.is_empty()),
            session_ttl: env_parse::<u64>("SESSION_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            slice: SliceSettings::from_env(),
            timeouts: TimeoutSettings::from_env(),
            replicate: ReplicateConfig::from_env(),
            gemini: GeminiConfig::from_env(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn with_slice(mut self, slice: SliceSettings) -> Self {
        self.slice = slice;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutSettings) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_replicate(mut self, config: ReplicateConfig) -> Self {
        self.replicate = config;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(ScrollError::ConfigError(format!(
                "canvas must be non-empty, got {}x{}",
                self.image_width, self.image_height
            )));
        }
        self.slice.validate()
    }

    /// Names of backend credentials that are missing.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.replicate.api_token.is_none() {
            missing.push("REPLICATE_API_TOKEN");
        }
        if self.gemini.api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        missing
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_fill(value: &str) -> Option<[u8; 3]> {
    match value.trim().to_ascii_lowercase().as_str() {
        "gray" | "grey" => return Some([128, 128, 128]),
        "black" => return Some([0, 0, 0]),
        _ => {}
    }
    let parts: Vec<u8> = value
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b]),
        _ => None,
    }
}

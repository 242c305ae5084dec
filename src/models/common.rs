use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrollError};

pub const DEFAULT_MODEL: &str = "flux-schnell";
pub const OUTPAINTING_MODEL: &str = "flux-fill-pro";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Speed,
    Outpainting,
    Balanced,
}

/// Static description of one image-generation model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelProfile {
    pub id: String,
    /// Backend identifier, `owner/name` on Replicate.
    pub name: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub use_case: UseCase,
    pub supports_inpainting: bool,
    /// Lower ranks are tried first when falling back.
    pub priority: u8,
}

impl ModelProfile {
    fn new(
        id: &str,
        name: &str,
        steps: u32,
        guidance_scale: f32,
        use_case: UseCase,
        supports_inpainting: bool,
        priority: u8,
    ) -> Self {
        ModelProfile {
            id: id.to_string(),
            name: name.to_string(),
            steps,
            guidance_scale,
            use_case,
            supports_inpainting,
            priority,
        }
    }
}

/// Read-only set of model profiles, built once at startup.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: Vec<ModelProfile>,
    default_index: usize,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry {
            profiles: vec![
                ModelProfile::new(
                    "flux-schnell",
                    "black-forest-labs/flux-schnell",
                    4,
                    0.0,
                    UseCase::Speed,
                    false,
                    1,
                ),
                ModelProfile::new(
                    "flux-fill-pro",
                    "black-forest-labs/flux-fill-pro",
                    16,
                    3.5,
                    UseCase::Outpainting,
                    true,
                    2,
                ),
                ModelProfile::new(
                    "flux-schnell-lora",
                    "black-forest-labs/flux-schnell-lora",
                    2,
                    1.0,
                    UseCase::Balanced,
                    false,
                    3,
                ),
            ],
            default_index: 0,
        }
    }
}

impl ModelRegistry {
    pub fn new(mut profiles: Vec<ModelProfile>, default_id: &str) -> Result<Self> {
        profiles.sort_by_key(|p| p.priority);
        let default_index = profiles
            .iter()
            .position(|p| p.id == default_id)
            .ok_or_else(|| {
                ScrollError::ConfigError(format!("default model '{}' is not registered", default_id))
            })?;
        Ok(ModelRegistry {
            profiles,
            default_index,
        })
    }

    /// Swaps the default model when `id` names a known profile.
    pub fn with_default(mut self, id: &str) -> Self {
        let position = self.profiles.iter().position(|p| p.id == id);
        match position {
            Some(index) => self.default_index = index,
            None => log::warn!(
                "Unknown default model '{}', keeping '{}'",
                id,
                self.default_model().id
            ),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn default_model(&self) -> &ModelProfile {
        &self.profiles[self.default_index]
    }

    /// Resolves a requested id, falling back to the default profile for unknown names.
    pub fn resolve(&self, id: Option<&str>) -> &ModelProfile {
        match id.and_then(|id| self.get(id)) {
            Some(profile) => profile,
            None => {
                if let Some(id) = id {
                    log::warn!(
                        "Unknown model '{}', using default '{}'",
                        id,
                        self.default_model().id
                    );
                }
                self.default_model()
            }
        }
    }

    /// The fallback of last resort: lowest priority rank.
    pub fn fastest(&self) -> &ModelProfile {
        self.profiles
            .iter()
            .min_by_key(|p| p.priority)
            .unwrap_or_else(|| self.default_model())
    }

    pub fn first_inpainting(&self) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| p.supports_inpainting)
    }

    pub fn ids(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.id.clone()).collect()
    }

    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }
}

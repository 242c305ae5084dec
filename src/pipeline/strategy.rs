use std::fmt;

use crate::models::{ModelProfile, ModelRegistry};

/// One way of producing a tile. A request plans an ordered list of these and
/// stops at the first that succeeds.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStrategy {
    /// Text-to-image for the first tile of a scroll.
    Initial(ModelProfile),
    /// Canvas + mask outpainting from the predecessor, then crop.
    Inpaint(ModelProfile),
    /// Text-to-image with contextual cues standing in for the predecessor.
    FastMode(ModelProfile),
}

impl GenerationStrategy {
    pub fn model(&self) -> &ModelProfile {
        match self {
            GenerationStrategy::Initial(model)
            | GenerationStrategy::Inpaint(model)
            | GenerationStrategy::FastMode(model) => model,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationStrategy::Initial(_) => "initial",
            GenerationStrategy::Inpaint(_) => "inpaint",
            GenerationStrategy::FastMode(_) => "fast",
        }
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.model().id)
    }
}

pub fn plan(
    registry: &ModelRegistry,
    requested: &ModelProfile,
    has_predecessor: bool,
) -> Vec<GenerationStrategy> {
    let fastest = registry.fastest();
    let distinct = fastest.id != requested.id;

    match (has_predecessor, requested.supports_inpainting) {
        (false, _) => {
            let mut strategies = vec![GenerationStrategy::Initial(requested.clone())];
            if distinct {
                strategies.push(GenerationStrategy::Initial(fastest.clone()));
            }
            strategies
        }
        (true, true) => vec![
            GenerationStrategy::Inpaint(requested.clone()),
            GenerationStrategy::FastMode(fastest.clone()),
        ],
        (true, false) => {
            let mut strategies = vec![GenerationStrategy::FastMode(requested.clone())];
            if distinct {
                strategies.push(GenerationStrategy::FastMode(fastest.clone()));
            }
            strategies
        }
    }
}

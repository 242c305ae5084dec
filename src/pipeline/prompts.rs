use crate::backends::TextBackend;
use crate::error::ScrollError;
use crate::models::TextGenerationRequest;

pub const DEFAULT_SCENE: &str = "a vast landscape";
pub const FALLBACK_SUFFIX: &str = "The landscape continues with new mysteries revealed.";

const MAX_SCENE_CHARS: usize = 400;

pub fn initial_prompt(scene: Option<&str>) -> String {
    match scene {
        Some(scene) => format!(
            "Perfect top-down aerial view of {scene} captured directly from above, bird's eye \
             perspective, satellite view, overhead shot, detailed terrain featuring {scene} \
             visible from high altitude"
        ),
        None => "Perfect top-down aerial view of a vast landscape captured directly from above, \
                 bird's eye perspective, satellite view, overhead shot, detailed terrain visible \
                 from high altitude"
            .to_string(),
    }
}

/// Prompt for inpainting: the canvas already carries the seam.
pub fn continuation_prompt(scene: &str) -> String {
    format!(
        "Continue this top-down aerial view seamlessly below the existing image. Current \
         perspective maintained, camera positioned directly overhead. {scene}. The view extends \
         naturally southward maintaining the exact same altitude and viewing angle."
    )
}

/// Prompt for text-only models, which never see the predecessor pixels.
pub fn contextual_cues(scene: &str) -> String {
    format!(
        "Continuing the scene from above, {scene}. The view extends downward naturally, \
         maintaining the same artistic style and perspective as the previous image. Aerial \
         view, captured from high above."
    )
}

pub fn evolution_instruction(current: &str, theme: Option<&str>) -> String {
    let theme_line = match theme {
        Some(theme) if theme != current => format!(
            "The whole journey explores this world: \"{theme}\". Stay inside that world.\n"
        ),
        _ => String::new(),
    };
    format!(
        "You are creating a visual narrative for an infinite scroll of top-down aerial images.\n\
         {theme_line}\
         Current scene: \"{current}\". Keep the scene as close to the original as possible, but \
         continue it in a logical order as if the camera was panning down.\n\n\
         Create the next scene in this visual story by:\n\
         1. STRICT top-down perspective, camera positioned directly overhead, bird's eye view\n\
         2. Same altitude and viewing angle maintained throughout\n\
         3. Adding new features that flow naturally from the previous scene\n\
         4. Keeping the response under 200 characters\n\n\
         Respond with ONLY the new scene description:"
    )
}

pub fn fallback_evolution(current: &str) -> String {
    format!("{}. {}", current, FALLBACK_SUFFIX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evolution {
    pub evolved: String,
    pub fell_back: bool,
}

/// Asks the text backend for the next scene; never fails.
pub async fn evolve(text: &dyn TextBackend, current: &str, theme: Option<&str>) -> Evolution {
    let mut request = TextGenerationRequest::new(evolution_instruction(current, theme));
    request.max_tokens = Some(256);

    let scene = text.generate(request).await.and_then(|response| {
        clean_scene(&response.text).ok_or_else(|| {
            ScrollError::PromptEvolutionError("text backend returned an empty scene".into())
        })
    });

    match scene {
        Ok(evolved) => {
            log::info!("✨ Prompt evolved: {}", evolved);
            Evolution {
                evolved,
                fell_back: false,
            }
        }
        Err(e) => {
            log::warn!("⚠️  Prompt evolution failed, using fallback: {}", e);
            fallback(current)
        }
    }
}

fn fallback(current: &str) -> Evolution {
    Evolution {
        evolved: fallback_evolution(current),
        fell_back: true,
    }
}

fn clean_scene(raw: &str) -> Option<String> {
    let scene = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if scene.is_empty() {
        return None;
    }
    Some(scene.chars().take(MAX_SCENE_CHARS).collect())
}

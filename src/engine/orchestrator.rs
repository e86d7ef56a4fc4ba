use std::sync::Arc;

use super::extractor;
use super::image_synth::ImageSynthesizer;
use super::prompt::build_system_prompt;
use super::provider::{GenerateRequest, LanguageModel, Part};
use super::types::{AnalysisRequest, AssistantTurn};
use crate::error::AppError;

/// Runs one assistant turn: flatten the transcript, call the model, extract a
/// schema, and optionally attach a reference illustration.
///
/// Stateless across requests; the whole history travels with every call.
pub struct ConversationOrchestrator {
    model: Arc<dyn LanguageModel>,
    synthesizer: Option<ImageSynthesizer>,
    system_prompt: String,
}

impl ConversationOrchestrator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            synthesizer: None,
            system_prompt: build_system_prompt(),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: ImageSynthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub async fn handle_turn(&self, request: &AnalysisRequest) -> Result<AssistantTurn, AppError> {
        if request.message.trim().is_empty() && request.image.is_none() {
            return Err(AppError::Validation("Message not provided".into()));
        }

        let generate = GenerateRequest {
            system_instruction: Some(self.system_prompt.clone()),
            parts: build_parts(request),
            response_modalities: Vec::new(),
        };

        tracing::debug!(
            model = %self.model.model_name(),
            history = request.conversation_history.len(),
            has_image = request.image.is_some(),
            "Sending turn to model"
        );

        let response = self.model.generate(generate).await?;
        let raw = response.text();
        let (schema, strategy) = extractor::extract_with_strategy(&raw);
        tracing::debug!(strategy = strategy.as_str(), "Extracted assistant reply");

        let generated_image = match (&schema.generate_image, &self.synthesizer) {
            (Some(description), Some(synth)) => synth.synthesize(description).await,
            (Some(_), None) => {
                tracing::debug!("Image directive ignored: no synthesizer configured");
                None
            }
            _ => None,
        };

        Ok(AssistantTurn::from_schema(schema, generated_image))
    }
}

/// Flatten the transcript into model input parts.
///
/// Each history entry contributes its image (if any) followed by a
/// speaker-labelled text line; the current turn comes last.
pub fn build_parts(request: &AnalysisRequest) -> Vec<Part> {
    let mut parts = Vec::with_capacity(request.conversation_history.len() * 2 + 2);

    for msg in &request.conversation_history {
        if let Some(ref image) = msg.image {
            parts.push(Part::image(image));
        }
        parts.push(Part::text(format!("{}: {}", msg.role.speaker_label(), msg.content)));
    }

    if let Some(ref image) = request.image {
        parts.push(Part::image(image));
    }
    parts.push(Part::text(format!("Usuario: {}", request.message)));
    parts
}

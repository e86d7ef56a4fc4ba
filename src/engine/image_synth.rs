use std::sync::Arc;

use super::prompt::build_image_prompt;
use super::provider::{GenerateRequest, LanguageModel, Modality, Part};
use super::types::ImagePayload;

/// Generates reference illustrations for icons and buttons.
///
/// Best-effort: every failure is logged and reported as `None`.
pub struct ImageSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl ImageSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn synthesize(&self, description: &str) -> Option<ImagePayload> {
        let description = description.trim();
        if description.is_empty() {
            return None;
        }

        let request = GenerateRequest {
            system_instruction: None,
            parts: vec![Part::text(build_image_prompt(description))],
            response_modalities: vec![Modality::Text, Modality::Image],
        };

        match self.model.generate(request).await {
            Ok(response) => {
                let image = response.first_image();
                if image.is_none() {
                    tracing::warn!(model = %self.model.model_name(), "Image model returned no inline image");
                }
                image
            }
            Err(e) => {
                tracing::warn!(model = %self.model.model_name(), "Error generating image: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::provider::{GenerateResponse, UpstreamError};
    use std::sync::Mutex;

    struct FakeImageModel {
        result: Result<GenerateResponse, UpstreamError>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    #[async_trait::async_trait]
    impl LanguageModel for FakeImageModel {
        fn model_name(&self) -> &str {
            "fake-image"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, UpstreamError> {
            self.seen.lock().unwrap().push(request);
            self.result.clone()
        }
    }

    fn fake(result: Result<GenerateResponse, UpstreamError>) -> Arc<FakeImageModel> {
        Arc::new(FakeImageModel {
            result,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_returns_first_inline_image() {
        let model = fake(Ok(GenerateResponse {
            parts: vec![
                Part::text("Here you go"),
                Part::InlineImage {
                    mime_type: "image/png".into(),
                    data: "AA==".into(),
                },
            ],
        }));
        let synth = ImageSynthesizer::new(model.clone());

        let image = synth.synthesize("engranaje").await.unwrap();
        assert_eq!(image.as_str(), "data:image/png;base64,AA==");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].response_modalities, vec![Modality::Text, Modality::Image]);
        match &seen[0].parts[0] {
            Part::Text(t) => assert!(t.contains("engranaje")),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_only_response_is_none() {
        let synth = ImageSynthesizer::new(fake(Ok(GenerateResponse {
            parts: vec![Part::text("no image")],
        })));
        assert!(synth.synthesize("engranaje").await.is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_is_absorbed() {
        let synth = ImageSynthesizer::new(fake(Err(UpstreamError::new(Some(500), "boom"))));
        assert!(synth.synthesize("engranaje").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_description_skips_call() {
        let model = fake(Ok(GenerateResponse::default()));
        let synth = ImageSynthesizer::new(model.clone());
        assert!(synth.synthesize("   ").await.is_none());
        assert!(model.seen.lock().unwrap().is_empty());
    }
}

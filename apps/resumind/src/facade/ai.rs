use bytes::Bytes;
use tracing::error;

use crate::facade::{absent_on_error, CapabilityFacade};
use crate::llm_client::MODEL;
use crate::models::resume::FeedbackResult;
use crate::platform::{BlobRef, ChatMessage, ChatOptions, ChatResponse, ChatRole, ContentPart};

/// Low temperature keeps scoring reproducible across runs.
pub const FEEDBACK_TEMPERATURE: f32 = 0.2;
/// Message recorded in the shared error state when inference fails.
pub const AI_FAILURE_MESSAGE: &str = "AI analysis failed";

/// AI group. Never raises; failures land in the shared error state.
pub struct AiCapability<'a> {
    pub(super) facade: &'a CapabilityFacade,
}

impl AiCapability<'_> {
    /// Sends the blob at `path` plus a free-text instruction to the chat
    /// endpoint and returns the raw response.
    pub async fn feedback(&self, path: &str, message: &str) -> Option<ChatResponse> {
        let platform = self.facade.platform()?;
        let messages = vec![ChatMessage {
            role: ChatRole::User,
            content: vec![
                ContentPart::File {
                    path: path.to_string(),
                },
                ContentPart::Text {
                    text: message.to_string(),
                },
            ],
        }];
        let options = ChatOptions {
            model: MODEL.to_string(),
            temperature: FEEDBACK_TEMPERATURE,
        };

        match platform.ai().chat(messages, options).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!("AI feedback error: {e}");
                self.facade.state.record_error(AI_FAILURE_MESSAGE);
                None
            }
        }
    }

    /// [`AiCapability::feedback`] followed by parsing the reply as a
    /// [`FeedbackResult`]. An unparsable reply counts as a failed inference.
    pub async fn infer(&self, reference: &BlobRef, prompt: &str) -> Option<FeedbackResult> {
        let response = self.feedback(reference.path(), prompt).await?;
        match FeedbackResult::parse(&response.text) {
            Ok(feedback) => Some(feedback),
            Err(e) => {
                error!("AI feedback for {reference} was unusable: {e}");
                self.facade.state.record_error(AI_FAILURE_MESSAGE);
                None
            }
        }
    }

    /// Transcribes the text in an image. Failures are logged, not recorded.
    pub async fn img2txt(&self, image: Bytes) -> Option<String> {
        let platform = self.facade.platform()?;
        absent_on_error("ai.img2txt", platform.ai().img2txt(image).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::test_support::bound_facade;
    use crate::platform::memory::MemoryPlatform;
    use crate::shared_state::SharedState;

    #[tokio::test]
    async fn test_feedback_sends_file_and_text_at_low_temperature() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        let reply = facade.ai().feedback("/r.pdf", "Rate it").await.unwrap();
        assert!(reply.text.contains("overallScore"));

        let requests = platform.memory_ai().requests();
        assert_eq!(requests.len(), 1);
        let (messages, options) = &requests[0];
        assert!((options.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(
            messages[0].content,
            vec![
                ContentPart::File {
                    path: "/r.pdf".to_string()
                },
                ContentPart::Text {
                    text: "Rate it".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_infer_parses_feedback() {
        let (facade, _platform) = bound_facade(MemoryPlatform::new());
        let feedback = facade
            .ai()
            .infer(&BlobRef::new("/r.pdf"), "Rate it")
            .await
            .unwrap();
        assert_eq!(feedback.overall_score, 78.0);
        assert!(feedback.categories.contains_key("ATS"));
    }

    #[tokio::test]
    async fn test_inference_failure_is_recorded_not_raised() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        platform.memory_ai().fail_with("model overloaded");

        let result = facade.ai().infer(&BlobRef::new("/r.pdf"), "Rate it").await;
        assert!(result.is_none());
        assert_eq!(facade.state().error().as_deref(), Some(AI_FAILURE_MESSAGE));

        facade.clear_error();
        assert!(facade.state().error().is_none());
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_a_failure() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        platform.memory_ai().set_reply("I think this resume is great!");

        assert!(facade
            .ai()
            .infer(&BlobRef::new("/r.pdf"), "Rate it")
            .await
            .is_none());
        assert_eq!(facade.state().error().as_deref(), Some(AI_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_unavailable_is_absent_without_error() {
        let facade = CapabilityFacade::new(SharedState::new());
        assert!(facade.ai().feedback("/r.pdf", "Rate it").await.is_none());
        assert!(facade
            .ai()
            .img2txt(Bytes::from_static(b"<svg/>"))
            .await
            .is_none());
        assert!(facade.state().error().is_none());
    }

    #[tokio::test]
    async fn test_img2txt_passes_text_through() {
        let (facade, _platform) = bound_facade(MemoryPlatform::new());
        let text = facade
            .ai()
            .img2txt(Bytes::from_static(b"  Jane Doe, Engineer \n"))
            .await;
        assert_eq!(text.as_deref(), Some("Jane Doe, Engineer"));
    }

    #[tokio::test]
    async fn test_img2txt_failure_is_absent() {
        let (facade, platform) = bound_facade(MemoryPlatform::new());
        platform.memory_ai().fail_with("vision model offline");

        assert!(facade
            .ai()
            .img2txt(Bytes::from_static(b"<svg/>"))
            .await
            .is_none());
    }
}

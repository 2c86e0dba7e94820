use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::llm_client::prompts::{DEFAULT_SYSTEM, TRANSCRIBE_IMAGE_PROMPT};
use crate::llm_client::{LlmClient, LlmContent, LlmMessage, MODEL};
use crate::platform::{
    AiApi, ChatMessage, ChatOptions, ChatResponse, ChatRole, ContentPart, FsApi, PlatformError,
    PlatformResult,
};

/// Inference through Claude. `File` parts are resolved against blob storage
/// and attached as documents, images or plain text depending on content.
pub struct LlmAi {
    llm: LlmClient,
    fs: Arc<dyn FsApi>,
}

impl LlmAi {
    pub fn new(llm: LlmClient, fs: Arc<dyn FsApi>) -> Self {
        Self { llm, fs }
    }

    async fn attachment(&self, path: &str) -> PlatformResult<LlmContent> {
        let bytes = self.fs.read(path).await?;
        Ok(attachment_for(&bytes))
    }
}

fn attachment_for(bytes: &[u8]) -> LlmContent {
    if bytes.starts_with(b"%PDF") {
        LlmContent::pdf(bytes)
    } else if let Some(media_type) = image_media_type(bytes) {
        LlmContent::image(media_type, bytes)
    } else {
        LlmContent::text(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Raster formats the Messages API accepts, sniffed from magic bytes.
fn image_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

#[async_trait]
impl AiApi for LlmAi {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> PlatformResult<ChatResponse> {
        let mut system: Vec<String> = Vec::new();
        let mut request: Vec<LlmMessage> = Vec::new();

        for message in messages {
            if message.role == ChatRole::System {
                system.extend(message.content.into_iter().filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text),
                    ContentPart::File { .. } => None,
                }));
                continue;
            }

            let mut content = Vec::with_capacity(message.content.len());
            for part in message.content {
                content.push(match part {
                    ContentPart::Text { text } => LlmContent::text(text),
                    ContentPart::File { path } => self.attachment(&path).await?,
                });
            }
            request.push(LlmMessage {
                role: role_name(message.role).to_string(),
                content,
            });
        }

        let system = if system.is_empty() {
            DEFAULT_SYSTEM.to_string()
        } else {
            system.join("\n\n")
        };

        let text = self
            .llm
            .call_text(&options.model, Some(&system), &request, options.temperature)
            .await
            .map_err(|e| PlatformError::Ai(e.to_string()))?;

        Ok(ChatResponse {
            model: options.model,
            text,
        })
    }

    async fn img2txt(&self, image: Bytes) -> PlatformResult<String> {
        let media_type =
            image_media_type(&image).ok_or(PlatformError::Unsupported("ai.img2txt (non-raster image)"))?;
        let request = [LlmMessage {
            role: "user".to_string(),
            content: vec![
                LlmContent::image(media_type, &image),
                LlmContent::text(TRANSCRIBE_IMAGE_PROMPT),
            ],
        }];
        self.llm
            .call_text(MODEL, None, &request, 0.0)
            .await
            .map_err(|e| PlatformError::Ai(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryFs;

    #[test]
    fn test_image_media_type_sniffing() {
        assert_eq!(image_media_type(b"\x89PNG\r\n\x1a\n"), Some("image/png"));
        assert_eq!(image_media_type(b"\xFF\xD8\xFF\xE0"), Some("image/jpeg"));
        assert_eq!(image_media_type(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(image_media_type(b"<svg></svg>"), None);
    }

    #[test]
    fn test_pdf_becomes_document_attachment() {
        assert!(matches!(
            attachment_for(b"%PDF-1.7 ..."),
            LlmContent::Document { .. }
        ));
        assert!(matches!(attachment_for(b"plain resume"), LlmContent::Text { .. }));
    }

    #[tokio::test]
    async fn test_img2txt_rejects_non_raster_images() {
        let llm = LlmClient::new("test-key".to_string()).unwrap();
        let ai = LlmAi::new(llm, Arc::new(MemoryFs::default()));

        let result = ai.img2txt(Bytes::from_static(b"<svg></svg>")).await;
        assert!(matches!(result, Err(PlatformError::Unsupported(_))));
    }
}

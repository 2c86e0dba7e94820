// Prompt fragments owned by the hosted AI capability itself.
// Domain prompts (resume feedback) live beside the code that sends them.

/// Instruction sent alongside an image for `img2txt`.
pub const TRANSCRIBE_IMAGE_PROMPT: &str = "Transcribe all text visible in this image. \
    Return the text only, preserving line breaks. \
    Do NOT add commentary, headings, or explanations.";

/// System prompt used when a chat request carries no system message.
pub const DEFAULT_SYSTEM: &str = "You are a careful assistant. \
    Follow the output format requested by the user exactly.";

//! Heuristic classification of model ids missing from the catalog

use domain::ModelCategory;

const REASONING_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5"];
const CHAT_PREFIXES: &[&str] = &["gpt-", "chatgpt-"];
const AUDIO_MARKERS: &[&str] = &["audio", "tts", "whisper", "transcribe"];
const IMAGE_MARKERS: &[&str] = &["dall-e", "image"];

/// Guess the category of a model from its id alone
///
/// Chat prefixes are checked after the substring rules, so
/// `gpt-4o-audio-preview` is audio and `gpt-image-1` is image.
pub fn classify_id(id: &str) -> ModelCategory {
    let id = id.trim().to_ascii_lowercase();

    if REASONING_PREFIXES.iter().any(|p| id.starts_with(p)) {
        ModelCategory::Reasoning
    } else if id.contains("embed") {
        ModelCategory::Embedding
    } else if AUDIO_MARKERS.iter().any(|m| id.contains(m)) {
        ModelCategory::Audio
    } else if IMAGE_MARKERS.iter().any(|m| id.contains(m)) {
        ModelCategory::Image
    } else if CHAT_PREFIXES.iter().any(|p| id.starts_with(p)) {
        ModelCategory::Chat
    } else {
        ModelCategory::Completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_prefixes() {
        assert_eq!(classify_id("o1-preview"), ModelCategory::Reasoning);
        assert_eq!(classify_id("o3"), ModelCategory::Reasoning);
        assert_eq!(classify_id("o4-mini-2025-04-16"), ModelCategory::Reasoning);
        assert_eq!(classify_id("gpt-5-nano"), ModelCategory::Reasoning);
    }

    #[test]
    fn substring_rules_beat_chat_prefix() {
        assert_eq!(classify_id("gpt-4o-audio-preview"), ModelCategory::Audio);
        assert_eq!(classify_id("gpt-4o-transcribe"), ModelCategory::Audio);
        assert_eq!(classify_id("gpt-image-1"), ModelCategory::Image);
    }

    #[test]
    fn embedding_and_image_markers() {
        assert_eq!(classify_id("text-embedding-3-small"), ModelCategory::Embedding);
        assert_eq!(classify_id("dall-e-3"), ModelCategory::Image);
        assert_eq!(classify_id("tts-1-hd"), ModelCategory::Audio);
        assert_eq!(classify_id("whisper-1"), ModelCategory::Audio);
    }

    #[test]
    fn chat_prefixes() {
        assert_eq!(classify_id("gpt-4o-2099-01-01"), ModelCategory::Chat);
        assert_eq!(classify_id("chatgpt-4o-latest"), ModelCategory::Chat);
    }

    #[test]
    fn everything_else_is_completion() {
        assert_eq!(classify_id("davinci-002"), ModelCategory::Completion);
        assert_eq!(classify_id(""), ModelCategory::Completion);
    }

    #[test]
    fn classification_ignores_case() {
        assert_eq!(classify_id("GPT-4O"), ModelCategory::Chat);
    }
}

//! Builds the `generateContent` request for a three-view drawing.

use crate::data_uri::normalize_mime_type;
use crate::error::{GenerationError, Result};
use serde::Serialize;

/// Context used in the instruction when the user entered none.
pub const DEFAULT_CONTEXT: &str = "General product design.";

/// Label recorded on a result when the user entered no context.
pub const DEFAULT_PROMPT_LABEL: &str = "Technical 3-view drawing";

/// Instruction sent alongside the product photo.
pub fn build_instruction(context: &str) -> String {
    let context = if context.is_empty() { DEFAULT_CONTEXT } else { context };

    format!(
        "Act as a professional Industrial Designer and Technical Draftsman.
I am providing an image of a product. Your task is to generate a high-quality 3-view technical drawing (Orthographic Projection).

USER SPECIFIC CONTEXT: {context}

REQUIREMENTS:
1. The output must contain exactly three distinct views: Top View, Front View, and Side View.
2. Arrange the views in a professional engineering layout.
3. Use a clean, neutral background (white or very light grey).
4. Retain all key textures, patterns, and geometric features mentioned in the context.
5. The style should look like a CAD render or a polished product blueprint.
6. Do not include excessive text labels unless they are part of the product's design."
    )
}

/// Label stored on a result: the context as entered, or a fixed default
/// when nothing was entered.
pub fn prompt_label(context: &str) -> String {
    if context.is_empty() {
        DEFAULT_PROMPT_LABEL.to_string()
    } else {
        context.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<RequestPart>,
}

/// A part in a request - inline image data or text.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl GenerateContentRequest {
    /// Image first, then the instruction.
    pub fn drawing(image_base64: &str, mime_type: &str, context: &str) -> Result<Self> {
        let data = image_base64.trim();
        if data.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "no image data to send".into(),
            ));
        }

        let parts = vec![
            RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: normalize_mime_type(mime_type),
                    data: data.to_string(),
                },
            },
            RequestPart::Text {
                text: build_instruction(context),
            },
        ];

        Ok(Self {
            contents: vec![Content { parts }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_embeds_context() {
        let text = build_instruction("Red mooncake with a Double Happiness pattern");
        assert!(text.contains("USER SPECIFIC CONTEXT: Red mooncake with a Double Happiness pattern"));
        assert!(text.contains("Top View, Front View, and Side View"));
    }

    #[test]
    fn test_instruction_uses_default_context() {
        let text = build_instruction("");
        assert!(text.contains("USER SPECIFIC CONTEXT: General product design."));
    }

    #[test]
    fn test_whitespace_context_is_kept_verbatim() {
        let text = build_instruction("  ");
        assert!(text.contains("USER SPECIFIC CONTEXT:   \n"));
        assert_eq!(prompt_label("  "), "  ");
    }

    #[test]
    fn test_prompt_label() {
        assert_eq!(prompt_label("red chair"), "red chair");
        assert_eq!(prompt_label(""), DEFAULT_PROMPT_LABEL);
    }

    #[test]
    fn test_request_serialization() {
        let req = GenerateContentRequest::drawing("AAA", "image/jpeg", "red chair").unwrap();
        let json = serde_json::to_value(&req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AAA");
        assert!(parts[1]["text"].as_str().unwrap().contains("red chair"));
        assert!(parts[0].get("inline_data").is_none());
    }

    #[test]
    fn test_request_defaults_bad_mime() {
        let req = GenerateContentRequest::drawing("AAA", "not a mime", "").unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn test_request_requires_image() {
        let err = GenerateContentRequest::drawing("  ", "image/png", "chair").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }
}

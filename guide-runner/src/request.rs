use guide_core::{Content, GuideError, MAX_INLINE_DATA_SIZE, Result};
use std::path::Path;

/// Longest study material sent verbatim; the rest is cut.
pub const MAX_MATERIAL_CHARS: usize = 30_000;

pub const TRUNCATION_NOTICE: &str = "\n\n[Content truncated due to length]";

pub const DEFAULT_USER_ID: &str = "local_user";

const MATERIAL_PREFIX: &str = "Please create a study guide from this material:\n\n";
const TOPIC_PREFIX: &str = "Please create a study guide about this topic:\n\n";
const PDF_PROMPT: &str = "Please create a study guide from the attached document.";

/// One external request: the material (or topic) plus who asked.
#[derive(Debug, Clone)]
pub struct StudyRequest {
    user_id: String,
    content: Content,
    source: Option<String>,
}

impl StudyRequest {
    /// Full study material as plain text.
    pub fn from_text(material: &str) -> Self {
        let material = truncate_material(material);
        Self::with_content(Content::new("user").with_text(format!("{MATERIAL_PREFIX}{material}")))
    }

    /// A bare topic; the overview stage researches it when it can.
    pub fn from_topic(topic: &str) -> Self {
        Self::with_content(Content::new("user").with_text(format!("{TOPIC_PREFIX}{}", topic.trim())))
    }

    /// A PDF document sent to the model as inline data.
    pub fn from_pdf(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() > MAX_INLINE_DATA_SIZE {
            return Err(GuideError::Config(format!(
                "PDF is {} bytes; at most {} bytes can be attached",
                bytes.len(),
                MAX_INLINE_DATA_SIZE
            )));
        }
        Ok(Self::with_content(
            Content::new("user").with_text(PDF_PROMPT).with_inline_data("application/pdf", bytes),
        ))
    }

    /// Reads `.txt`/`.md` files as text and `.pdf` files as documents.
    /// The file stem becomes the request's source identifier.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        let request = match extension.as_deref() {
            Some("pdf") => Self::from_pdf(tokio::fs::read(path).await?)?,
            Some("txt") | Some("md") | Some("markdown") => {
                let text = tokio::fs::read_to_string(path).await?;
                if text.trim().is_empty() {
                    return Err(GuideError::Config(format!("{} is empty", path.display())));
                }
                Self::from_text(&text)
            }
            _ => {
                return Err(GuideError::Config(format!(
                    "unsupported input file {} (expected .txt, .md or .pdf)",
                    path.display()
                )));
            }
        };
        let stem = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        Ok(match stem {
            Some(stem) => request.with_source(stem),
            None => request,
        })
    }

    fn with_content(content: Content) -> Self {
        Self { user_id: DEFAULT_USER_ID.to_string(), content, source: None }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Identifier the output file name is derived from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// Cuts material to [`MAX_MATERIAL_CHARS`] characters and marks the cut.
pub fn truncate_material(material: &str) -> String {
    match material.char_indices().nth(MAX_MATERIAL_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                chars = material.chars().count(),
                limit = MAX_MATERIAL_CHARS,
                "study material is long; truncating"
            );
            format!("{}{}", &material[..cut], TRUNCATION_NOTICE)
        }
        None => material.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_prefixes_material() {
        let request = StudyRequest::from_text("Cells divide by mitosis.");
        assert_eq!(
            request.content().text(),
            "Please create a study guide from this material:\n\nCells divide by mitosis."
        );
        assert_eq!(request.user_id(), DEFAULT_USER_ID);
        assert!(request.source().is_none());
    }

    #[test]
    fn test_truncation() {
        let long = "é".repeat(MAX_MATERIAL_CHARS + 10);
        let cut = truncate_material(&long);
        assert!(cut.ends_with(TRUNCATION_NOTICE));
        assert_eq!(cut.chars().count(), MAX_MATERIAL_CHARS + TRUNCATION_NOTICE.chars().count());

        let short = "short";
        assert_eq!(truncate_material(short), short);
    }

    #[test]
    fn test_pdf_is_inline_data() {
        let request = StudyRequest::from_pdf(b"%PDF-1.7".to_vec()).unwrap().with_user_id("u1");
        assert_eq!(request.content().parts[1].mime_type(), Some("application/pdf"));
        assert_eq!(request.user_id(), "u1");
    }

    #[test]
    fn test_oversized_pdf_rejected() {
        let err = StudyRequest::from_pdf(vec![0; MAX_INLINE_DATA_SIZE + 1]).unwrap_err();
        assert!(matches!(err, GuideError::Config(_)));
    }

    #[test]
    fn test_topic() {
        let request = StudyRequest::from_topic("  Photosynthesis ");
        assert!(request.content().text().ends_with("\n\nPhotosynthesis"));
    }
}

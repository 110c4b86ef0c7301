use guide_core::Result;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_FILE: &str = "study_guide_output.md";

/// `study_guide_{identifier}.md` inside `dir`, or [`DEFAULT_OUTPUT_FILE`]
/// when there is no usable identifier.
pub fn output_path(dir: impl AsRef<Path>, identifier: Option<&str>) -> PathBuf {
    let stem = identifier.map(sanitize).filter(|s| !s.is_empty());
    let file = match stem {
        Some(stem) => format!("study_guide_{}.md", stem),
        None => DEFAULT_OUTPUT_FILE.to_string(),
    };
    dir.as_ref().join(file)
}

fn sanitize(identifier: &str) -> String {
    let cleaned: String = identifier
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    cleaned.trim_matches('_').to_string()
}

/// Writes the document as UTF-8, creating parent directories.
pub async fn write_document(path: impl AsRef<Path>, document: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, document.as_bytes()).await?;
    tracing::info!(path = %path.display(), bytes = document.len(), "study guide written");
    Ok(())
}

//! Terminal rendering of the session and the result download.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::intake::{DataUrl, EncodedImage};
use crate::session::{GenerationStatus, TryOnSession};

/// Suggested file name for a downloaded result
pub const RESULT_FILENAME: &str = "aiedit-pro-result.png";

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("Result is not a base64 data URL")]
    InvalidResult,

    #[error("Result payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write result to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One line per input slot, then the result panel
pub fn render(session: &TryOnSession) -> String {
    let mut out = String::new();

    out.push_str(&slot_line("1. The Clothing", session.cloth_image()));
    out.push_str(&slot_line("2. The Model", session.person_image()));
    out.push('\n');
    out.push_str(&render_result(session.generation_status()));
    out
}

fn slot_line(title: &str, image: Option<&EncodedImage>) -> String {
    match image {
        Some(image) => format!(
            "{}: {} ({})\n",
            title,
            image.source.path().display(),
            image.mime_type
        ),
        None => format!("{}: Click or Drag to Upload\n", title),
    }
}

/// The result area for a given status
pub fn render_result(status: &GenerationStatus) -> String {
    match status {
        GenerationStatus::Idle => "Ready to Create\n\
             Upload your cloth and person images, then hit Generate to see the magic.\n"
            .to_string(),
        GenerationStatus::Loading => "Generating Try-On...\nMixing pixels with AI magic\n".to_string(),
        GenerationStatus::Error { message } => format!("Generation Failed\n{}\n", message),
        GenerationStatus::Success { image } => {
            let kind = DataUrl::parse(image)
                .map(|url| url.mime_type)
                .unwrap_or_else(|| "unknown".to_string());
            format!("Success\nGenerated Try-On ({}, {} base64 chars)\n", kind, image.len())
        }
    }
}

/// Where a download lands when no explicit path is given
pub fn default_result_path(dir: &Path) -> PathBuf {
    dir.join(RESULT_FILENAME)
}

/// Decode a result data URL and write the image bytes to `path`
pub async fn save_result(result: &str, path: &Path) -> Result<PathBuf, PresentationError> {
    let url = DataUrl::parse(result).ok_or(PresentationError::InvalidResult)?;
    let bytes = url.decode()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PresentationError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(path, &bytes)
        .await
        .map_err(|source| PresentationError::Write {
            path: path.to_path_buf(),
            source,
        })?;

    info!("Saved result to {:?} ({} bytes)", path, bytes.len());
    Ok(path.to_path_buf())
}

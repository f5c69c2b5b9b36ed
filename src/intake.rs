//! Image intake
//!
//! Turns a user-supplied image file into an [`EncodedImage`]: a data URL for
//! display plus the raw base64 payload and media type sent to the generator.
//! The picker and drop entry points share a single decode path,
//! [`encode_file`]; they differ only in whether the media type is filtered.

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Media type used in the data URL when the file reports none
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Errors that can occur while reading an image file
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Failed to read image file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeSource {
    /// File picker. Its image filter is advisory, so nothing is rejected here.
    Picker,
    /// Drag and drop. Only files reporting an `image/*` type are accepted.
    Drop,
}

/// Opaque handle to a user-supplied file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    /// Media type reported for the file, empty if unknown
    reported_type: String,
}

impl SourceFile {
    /// Build a handle whose reported type is derived from the file extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let reported_type = mime_guess::from_path(&path).first_raw().unwrap_or_default();
        Self::with_reported_type(path, reported_type)
    }

    /// Build a handle with an explicit reported type.
    ///
    /// Only a bare `type/subtype` token is kept. Anything with parameters,
    /// separators or whitespace is treated as unknown, since it could not be
    /// embedded in a data URL prefix and parsed back unchanged.
    pub fn with_reported_type(path: impl Into<PathBuf>, reported_type: &str) -> Self {
        let reported_type = if is_mime_token(reported_type) {
            reported_type.to_string()
        } else {
            String::new()
        };
        Self {
            path: path.into(),
            reported_type,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reported_type(&self) -> &str {
        &self.reported_type
    }

    pub fn is_image(&self) -> bool {
        self.reported_type.starts_with("image/")
    }
}

fn is_mime_token(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && value
                    .chars()
                    .all(|c| c.is_ascii_graphic() && !matches!(c, ',' | ';' | '"'))
        }
        None => false,
    }
}

/// A parsed `data:<mime>;base64,<payload>` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub base64: String,
}

impl DataUrl {
    pub fn new(mime_type: &str, base64: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            base64: base64.to_string(),
        }
    }

    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            base64: STANDARD.encode(bytes),
        }
    }

    /// Parse a base64 data URL. Returns `None` unless the string has a
    /// `data:` scheme, a `;`-terminated media type and a `,` separator.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let (mime_type, _params) = header.split_once(';')?;
        Some(Self {
            mime_type: mime_type.to_string(),
            base64: payload.to_string(),
        })
    }

    /// Decode the payload back into raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.base64.as_bytes())
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// An uploaded image ready for preview and for the generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub source: SourceFile,
    /// Data URL for display
    pub preview_url: String,
    /// Raw base64 payload, without the data URL prefix
    pub base64: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// Encode in-memory file contents the way a browser `FileReader` would
    pub fn from_bytes(source: SourceFile, bytes: &[u8]) -> Self {
        let embed_type = if source.reported_type.is_empty() {
            UNKNOWN_MIME_TYPE
        } else {
            source.reported_type.as_str()
        };
        let preview_url = DataUrl::from_bytes(embed_type, bytes).to_string();

        let (mime_type, base64) = match DataUrl::parse(&preview_url) {
            Some(parsed) if !parsed.mime_type.is_empty() => (parsed.mime_type, parsed.base64),
            Some(parsed) => (source.reported_type.clone(), parsed.base64),
            None => (source.reported_type.clone(), String::new()),
        };

        Self {
            source,
            preview_url,
            base64,
            mime_type,
        }
    }

    /// Rebuild the data URL from the extracted payload and media type
    pub fn to_data_url(&self) -> DataUrl {
        DataUrl::new(&self.mime_type, &self.base64)
    }
}

/// Read a file fully into memory and encode it
pub async fn encode_file(file: &SourceFile) -> Result<EncodedImage, IntakeError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|source| IntakeError::Read {
            path: file.path.clone(),
            source,
        })?;

    debug!(
        "Read {:?}: {} bytes, reported type {:?}",
        file.path,
        bytes.len(),
        file.reported_type
    );

    Ok(EncodedImage::from_bytes(file.clone(), &bytes))
}

/// Handle a picker selection or a drop.
///
/// A missing file is a no-op, as is a drop whose reported type is not an image.
pub async fn intake(
    source: IntakeSource,
    file: Option<SourceFile>,
) -> Result<Option<EncodedImage>, IntakeError> {
    let Some(file) = file else {
        return Ok(None);
    };

    if source == IntakeSource::Drop && !file.is_image() {
        debug!(
            "Ignoring dropped file {:?} with type {:?}",
            file.path, file.reported_type
        );
        return Ok(None);
    }

    let image = encode_file(&file).await?;
    info!(
        "Loaded image {:?} ({}, {} base64 chars)",
        image.source.path,
        image.mime_type,
        image.base64.len()
    );
    Ok(Some(image))
}

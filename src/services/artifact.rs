use crate::error::DecodeError;
use crate::models::{Artifact, BinaryDocument};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Standard alphabet, padding optional (proxies occasionally strip it).
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Default file name for a downloaded spreadsheet.
pub const DEFAULT_OUTPUT_NAME: &str = "output.xlsx";

/// Turns a job artifact into a document for the presentation layer.
///
/// Inline payloads are base64-decoded and tagged with `mime_type`; URL
/// references pass through untouched.
pub fn decode_artifact(artifact: Artifact, mime_type: &str) -> Result<BinaryDocument, DecodeError> {
    match artifact {
        Artifact::Reference(url) => Ok(BinaryDocument::Reference { url }),
        Artifact::Inline(payload) => {
            let bytes = decode_payload(&payload)?;
            Ok(BinaryDocument::Inline {
                bytes: Bytes::from(bytes),
                mime_type: mime_type.to_string(),
            })
        }
    }
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    // Accept data URLs as produced by browser file readers
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(PAYLOAD_ENGINE.decode(compact)?)
}

/// Encodes raw bytes the way inline artifacts and assistant uploads carry them.
pub fn encode_payload(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

impl BinaryDocument {
    /// Writes inline content to `path`. For a reference, nothing is written and
    /// the URL is returned instead.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<Option<PathBuf>> {
        match self {
            BinaryDocument::Inline { bytes, .. } => {
                let path = path.as_ref();
                tokio::fs::write(path, bytes).await?;
                tracing::info!("💾 Saved {} bytes to {}", bytes.len(), path.display());
                Ok(Some(path.to_path_buf()))
            }
            BinaryDocument::Reference { url } => {
                tracing::info!("🔗 Result available at {}", url);
                Ok(None)
            }
        }
    }
}

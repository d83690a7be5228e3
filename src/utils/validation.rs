use crate::config::ClientConfig;
use crate::error::ValidationError;
use crate::models::LocalFile;
use std::path::Path;

/// Magic byte signatures for declared-type verification
const MAGIC_SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x25, 0x50, 0x44, 0x46], "application/pdf"), // %PDF
    (&[0x89, 0x50, 0x4E, 0x47], "image/png"),       // PNG
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),            // JPEG
    (
        &[0x50, 0x4B, 0x03, 0x04],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ), // ZIP container
];

/// Bytes inspected for signatures. PDF readers accept the `%PDF` marker
/// anywhere in this window.
pub const HEADER_LEN: usize = 1024;

/// Full validation pipeline for a selected document. Performs no I/O.
pub fn validate(file: &LocalFile, config: &ClientConfig) -> Result<(), ValidationError> {
    // 1. MIME type check
    validate_mime_type(&file.mime_type, &config.allowed_mime_types)?;

    // 2. Size check
    validate_file_size(file.size, config.max_file_size as u64)?;

    // 3. Filename must survive sanitising
    sanitize_filename(&file.name)?;

    // 4. Content must match the declared type
    verify_magic_bytes(file.header(), &file.mime_type)?;

    Ok(())
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::TooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Validates MIME type against allowlist
pub fn validate_mime_type(content_type: &str, allowed: &[String]) -> Result<(), ValidationError> {
    let normalized = normalize_mime(content_type);

    if allowed.iter().any(|a| normalize_mime(a) == normalized) {
        return Ok(());
    }

    Err(ValidationError::WrongType {
        found: content_type.to_string(),
        allowed: allowed.join(", "),
    })
}

fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Longest filename kept in a storage key, in bytes.
pub const MAX_FILENAME_LEN: usize = 200;

/// Strips any path and control characters. Everything else is kept as-is,
/// since object keys accept arbitrary UTF-8.
///
/// Over-long names lose their leading bytes so the extension survives.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let normalized = filename.replace('\\', "/");
    let name = Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from filename: {}", filename);
    }

    let sanitized: String = name.chars().filter(|c| !c.is_control()).collect();

    if sanitized.trim().is_empty() {
        return Err(ValidationError::InvalidFilename(
            "Filename cannot be empty".to_string(),
        ));
    }

    if sanitized.len() <= MAX_FILENAME_LEN {
        return Ok(sanitized);
    }

    let mut start = sanitized.len() - MAX_FILENAME_LEN;
    while !sanitized.is_char_boundary(start) {
        start += 1;
    }
    Ok(sanitized[start..].to_string())
}

/// Checks that the leading bytes agree with the declared MIME type
pub fn verify_magic_bytes(header: &[u8], claimed_mime: &str) -> Result<(), ValidationError> {
    let claimed = normalize_mime(claimed_mime);

    if is_executable_content(header) {
        return Err(ValidationError::WrongType {
            found: "executable content".to_string(),
            allowed: claimed,
        });
    }

    let Some((signature, _)) = MAGIC_SIGNATURES.iter().find(|(_, mime)| *mime == claimed) else {
        // No reliable signature for this type
        return Ok(());
    };

    let matches = if claimed == "application/pdf" {
        let window = &header[..header.len().min(HEADER_LEN)];
        window.windows(signature.len()).any(|w| w == *signature)
    } else {
        header.starts_with(signature)
    };

    if matches {
        Ok(())
    } else {
        Err(ValidationError::WrongType {
            found: format!("content not matching {}", claimed),
            allowed: claimed,
        })
    }
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF, PE/COFF, Mach-O, shebang
    header.starts_with(&[0x7F, 0x45, 0x4C, 0x46])
        || header.starts_with(&[0x4D, 0x5A])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
        || header.starts_with(b"#!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file(name: &str, mime: &str, content: &'static [u8]) -> LocalFile {
        LocalFile::new(name, mime, Bytes::from_static(content))
    }

    #[test]
    fn test_validate_accepts_pdf() {
        let config = ClientConfig::default();
        assert!(validate(&file("rx.pdf", "application/pdf", b"%PDF-1.7"), &config).is_ok());
        assert!(validate(&file("rx.pdf", "Application/PDF; charset=binary", b"%PDF-1.7"), &config).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let config = ClientConfig::default();
        for mime in ["image/png", "text/plain", "application/zip", ""] {
            let err = validate(&file("rx.pdf", mime, b"%PDF-1.7"), &config).unwrap_err();
            assert!(matches!(err, ValidationError::WrongType { .. }), "{mime}");
        }
    }

    #[test]
    fn test_validate_rejects_too_large() {
        let config = ClientConfig {
            max_file_size: 4,
            ..ClientConfig::default()
        };
        let err = validate(&file("rx.pdf", "application/pdf", b"%PDF-1.7"), &config).unwrap_err();
        assert_eq!(err, ValidationError::TooLarge { size: 8, max: 4 });
    }

    #[test]
    fn test_validate_file_size_boundary() {
        assert!(validate_file_size(1024, 1024).is_ok());
        assert!(validate_file_size(1025, 1024).is_err());
    }

    #[test]
    fn test_validate_accepts_pdf_with_preamble() {
        let config = ClientConfig::default();
        let preamble = file("rx.pdf", "application/pdf", b"\r\n%PDF-1.4\n1 0 obj");
        assert!(validate(&preamble, &config).is_ok());

        let mut late = vec![b' '; HEADER_LEN - 4];
        late.extend_from_slice(b"%PDF-1.7");
        let late = LocalFile::new("rx.pdf", "application/pdf", Bytes::from(late));
        assert!(validate(&late, &config).is_ok());

        let mut too_late = vec![b' '; HEADER_LEN];
        too_late.extend_from_slice(b"%PDF-1.7");
        let too_late = LocalFile::new("rx.pdf", "application/pdf", Bytes::from(too_late));
        assert!(matches!(
            validate(&too_late, &config),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_disguised_content() {
        let config = ClientConfig::default();
        let err = validate(&file("rx.pdf", "application/pdf", b"PK\x03\x04zip"), &config).unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { .. }));

        let err = validate(&file("rx.pdf", "application/pdf", b"MZ\x90\x00"), &config).unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { .. }));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("test.pdf").unwrap(), "test.pdf");
        assert_eq!(sanitize_filename("my scan.pdf").unwrap(), "my scan.pdf");
        assert_eq!(sanitize_filename("a<b>|c.pdf").unwrap(), "a<b>|c.pdf");
        assert_eq!(sanitize_filename("Rx: May?.pdf").unwrap(), "Rx: May?.pdf");
        assert_eq!(sanitize_filename("rx\u{0}\n.pdf").unwrap(), "rx.pdf");
        assert_eq!(sanitize_filename("../../etc/rx.pdf").unwrap(), "rx.pdf");
        assert_eq!(sanitize_filename("C:\\scans\\rx.pdf").unwrap(), "rx.pdf");
        assert_eq!(sanitize_filename("処方箋.pdf").unwrap(), "処方箋.pdf");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
    }

    #[test]
    fn test_sanitize_long_filename_keeps_extension() {
        let long = format!("{}.pdf", "a".repeat(250));
        let name = sanitize_filename(&long).unwrap();
        assert_eq!(name.len(), MAX_FILENAME_LEN);
        assert!(name.ends_with(".pdf"));
        assert!(long.ends_with(&name));

        let wide = format!("{}.pdf", "処".repeat(100));
        let name = sanitize_filename(&wide).unwrap();
        assert!(name.len() <= MAX_FILENAME_LEN);
        assert!(name.ends_with("処.pdf"));
    }

    #[test]
    fn test_is_executable_content() {
        assert!(is_executable_content(&[0x7F, 0x45, 0x4C, 0x46, 0x00]));
        assert!(is_executable_content(b"#!/bin/sh"));
        assert!(!is_executable_content(b"%PDF-1.4"));
    }
}

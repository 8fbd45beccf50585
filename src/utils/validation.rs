use anyhow::{Result, anyhow};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Image formats the derivative pipeline can decode
const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size == 0 {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "Uploaded file is empty".to_string(),
        }));
    }
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed size of {} bytes",
                size, max_size
            ),
        }));
    }
    Ok(())
}

/// Detects the real content type from magic bytes and checks it is a supported image
pub fn detect_image_type(data: &[u8]) -> Result<&'static str> {
    let kind = infer::get(data).ok_or_else(|| {
        anyhow!(ValidationError {
            code: "UNKNOWN_TYPE",
            message: "Could not determine the file type".to_string(),
        })
    })?;

    let mime = kind.mime_type();
    if SUPPORTED_IMAGE_TYPES.contains(&mime) {
        Ok(mime)
    } else {
        Err(anyhow!(ValidationError {
            code: "INVALID_MIME_TYPE",
            message: format!(
                "File type '{}' is not allowed. Only JPEG, PNG, GIF and WebP images are accepted.",
                mime
            ),
        }))
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    // Names end up in URLs and on disk: keep a conservative alphabet
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = if sanitized.len() > 200 {
        sanitized[sanitized.len() - 200..].to_string()
    } else {
        sanitized
    };

    // Prevent hidden files
    if sanitized.starts_with('.') {
        return Err(anyhow!(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        }));
    }

    Ok(sanitized)
}

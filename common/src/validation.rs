// common/src/validation.rs
//! Checks the knowledge page runs before anything goes over the network.
//! The backend may enforce its own limits independently.
use url::Url;

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = [".pdf", ".docx", ".txt", ".md"];
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

pub const INVALID_FILE_TYPE: &str = "Invalid file type. Please upload PDF, DOCX, TXT, or MD files.";
pub const FILE_TOO_LARGE: &str = "File too large. Maximum size is 50MB.";
pub const MISSING_URL: &str = "Please enter a URL";
pub const INVALID_URL: &str = "Invalid URL format";

/// Lowercased extension including the dot, taken from the last `.`
fn extension_of(file_name: &str) -> Option<String> {
    file_name
        .rfind('.')
        .map(|idx| file_name[idx..].to_lowercase())
}

pub fn validate_file_type(file_name: &str) -> Result<(), AppError> {
    match extension_of(file_name) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::validation(INVALID_FILE_TYPE)),
    }
}

pub fn validate_file_size(size: u64) -> Result<(), AppError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::validation(FILE_TOO_LARGE));
    }
    Ok(())
}

/// Type first, then size, matching the order the page reports them in
pub fn validate_upload(file_name: &str, size: u64) -> Result<(), AppError> {
    validate_file_type(file_name)?;
    validate_file_size(size)
}

pub fn validate_source_url(input: &str) -> Result<Url, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(MISSING_URL));
    }
    Url::parse(trimmed).map_err(|_| AppError::validation(INVALID_URL))
}

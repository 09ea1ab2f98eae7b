use crate::services::drivers::BackendError;

/// Longest file name accepted by any supported provider, in bytes.
pub const MAX_FILE_NAME_BYTES: usize = 255;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for BackendError {
    fn from(e: ValidationError) -> Self {
        BackendError::InvalidArgument(e.to_string())
    }
}

/// Validates the name of a file that is about to be created inside a directory.
/// Unlike upload sanitizing, nothing is rewritten: a bad name is rejected.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if name == "." || name == ".." {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: format!("'{}' is not a valid filename", name),
        });
    }

    if name.contains('/') || name.contains('\\') {
        tracing::warn!("Path separator in upload filename: {}", name);
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot contain path separators".to_string(),
        });
    }

    if name.chars().any(|c| c.is_control()) {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot contain control characters".to_string(),
        });
    }

    if name.len() > MAX_FILE_NAME_BYTES {
        return Err(ValidationError {
            code: "FILENAME_TOO_LONG",
            message: format!(
                "Filename is {} bytes, maximum is {}",
                name.len(),
                MAX_FILE_NAME_BYTES
            ),
        });
    }

    Ok(())
}

/// Declared sizes must be positive; empty files go through the server.
pub fn validate_file_size(size: i64) -> Result<(), ValidationError> {
    if size <= 0 {
        return Err(ValidationError {
            code: "INVALID_FILE_SIZE",
            message: format!("Declared file size must be positive, got {}", size),
        });
    }
    Ok(())
}

/// Checks the client-supplied part of a direct upload request before any
/// provider is contacted.
pub fn validate_upload_target(file_name: &str, file_size: i64) -> Result<(), BackendError> {
    validate_file_name(file_name)?;
    validate_file_size(file_size)?;
    Ok(())
}

use crate::error::PathError;
use std::path::{Path, PathBuf};

/// Maximum path length to prevent buffer overflows
pub const MAX_PATH_LENGTH: usize = 1024;

/// Maximum number of path components to prevent deeply nested attacks
pub const MAX_PATH_COMPONENTS: usize = 32;

/// Validate and sanitize HTTP request path to prevent directory traversal attacks
pub fn validate_request_path(path: &str) -> Result<String, PathError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(PathError::TooLong);
    }

    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute);
    }

    // Decode first so encoded dots and slashes get the same checks
    let decoded = urlencoding::decode(path)
        .map_err(|_| PathError::InvalidEncoding)?
        .into_owned();

    if decoded.contains('\0') {
        return Err(PathError::NullByte);
    }

    let components: Vec<&str> = decoded.split('/').skip(1).collect();

    if components.len() > MAX_PATH_COMPONENTS {
        return Err(PathError::TooManyComponents);
    }

    let mut sanitized_components = Vec::new();

    for component in components {
        // Skip empty components (double slashes)
        if component.is_empty() {
            continue;
        }

        if component == ".." || component == "." {
            return Err(PathError::Traversal);
        }

        if component.contains(['\\', '\0', '<', '>', '|', '?', '*']) {
            return Err(PathError::InvalidCharacters);
        }

        if component.starts_with('.') {
            return Err(PathError::Hidden);
        }

        if component.len() > 255 {
            return Err(PathError::ComponentTooLong);
        }

        sanitized_components.push(component);
    }

    let safe_path = if sanitized_components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", sanitized_components.join("/"))
    };

    Ok(safe_path)
}

/// Join a sanitized request path onto the static root.
pub fn join_public_path(public_dir: &Path, safe_path: &str) -> PathBuf {
    let mut file_path = public_dir.to_path_buf();
    for component in safe_path.split('/').filter(|c| !c.is_empty()) {
        file_path.push(component);
    }
    file_path
}

/// Validate that an existing file path is within the allowed public directory
pub fn validate_file_path(file_path: &Path, public_dir: &Path) -> Result<PathBuf, PathError> {
    // Canonicalize paths to resolve any symlinks or relative components
    let canonical_file = file_path
        .canonicalize()
        .map_err(|_| PathError::OutsideRoot)?;
    let canonical_public = public_dir
        .canonicalize()
        .map_err(|_| PathError::OutsideRoot)?;

    if !canonical_file.starts_with(&canonical_public) {
        return Err(PathError::OutsideRoot);
    }

    Ok(canonical_file)
}

// ABOUTME: Utility functions for the showtell application
// ABOUTME: Provides path validation, asset path sanitizing, address and content-type helpers

use crate::errors::{Result, ShowError};
use std::path::{Component, Path, PathBuf};

/// Validate that a file exists
pub fn validate_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ShowError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ShowError::ValidationError(format!(
            "Path is not a file: {:?}",
            path
        )));
    }
    Ok(())
}

/// Validate that a directory exists
pub fn validate_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ShowError::PathNotFoundError(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ShowError::ValidationError(format!(
            "Path is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| ShowError::io(path, e))?;
    } else if !path.is_dir() {
        return Err(ShowError::ValidationError(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent_directory_exists(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory_exists(parent)?;
        }
    }
    Ok(())
}

/// Get the absolute path
pub fn get_absolute_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        ShowError::ValidationError(format!("Failed to get absolute path for {:?}: {}", path, e))
    })
}

/// Turn an asset path from a URL or a store listing into a relative path.
/// Absolute paths and parent-directory components are rejected.
pub fn sanitize_asset_path(path: &str) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return Err(ShowError::InvalidAssetPath(path.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(ShowError::InvalidAssetPath(path.to_string()));
    }
    Ok(clean)
}

/// Accept Go-style `:8080` listen addresses as well as `host:port`.
pub fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    }
}

/// Determine the content type based on the file extension
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

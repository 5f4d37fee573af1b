// ABOUTME: XDG Base Directory paths for cross-platform config and data storage
// ABOUTME: Provides standardized paths for logs, the Matrix state store, and the infraction database

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "warden";
const APPLICATION: &str = "warden";

/// Get XDG-compliant directories for the application
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Get the data directory path (e.g., ~/.local/share/warden/)
/// Falls back to ./data if XDG directories unavailable
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// e.g., ~/.local/share/warden/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Matrix SDK state and crypto store root
pub fn matrix_store_dir() -> PathBuf {
    data_dir().join("matrix_store")
}

/// Default location of the infraction database
pub fn database_file() -> PathBuf {
    data_dir().join("warden.db")
}

/// Get the config directory path (e.g., ~/.config/warden/)
/// Falls back to current directory if XDG directories unavailable
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// e.g., ~/.config/warden/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{UploadError, UploadResult};
use crate::types::Category;

/// Boundaries for the simulated-progress phases of one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPhases {
    /// Percentage reached by the fast phase.
    pub fast_end_pct: f32,
    /// Ceiling the slow phase approaches but never exceeds.
    pub slow_end_pct: f32,
    /// Milliseconds between simulated ticks.
    pub tick_interval_ms: u64,
}

/// Static per-category upload settings. Loaded once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub display_name: String,
    pub max_size_bytes: u64,
    /// Accepted media types; `None` means any type is accepted.
    pub allowed_media_types: Option<Vec<String>>,
    pub endpoint_path: String,
    /// Multipart field the file bytes are posted under.
    pub field_name: String,
    pub progress_phases: ProgressPhases,
    pub transfer_timeout_ms: u64,
}

impl CategoryConfig {
    pub fn max_size_mb(&self) -> u64 {
        (self.max_size_bytes as f64 / 1_048_576.0).round() as u64
    }
}

/// Top-level uploader configuration: the category table plus the endpoint base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    pub base_url: String,
    pub image: CategoryConfig,
    pub video: CategoryConfig,
    pub file: CategoryConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            image: CategoryConfig {
                display_name: "Image".to_string(),
                max_size_bytes: 20 * 1024 * 1024,
                allowed_media_types: Some(vec![
                    "image/jpeg".to_string(),
                    "image/png".to_string(),
                    "image/gif".to_string(),
                    "image/webp".to_string(),
                ]),
                endpoint_path: "/api/v1/messages/image".to_string(),
                field_name: "image".to_string(),
                progress_phases: ProgressPhases {
                    fast_end_pct: 60.0,
                    slow_end_pct: 90.0,
                    tick_interval_ms: 200,
                },
                transfer_timeout_ms: 30_000,
            },
            video: CategoryConfig {
                display_name: "Video".to_string(),
                max_size_bytes: 100 * 1024 * 1024,
                allowed_media_types: Some(vec![
                    "video/mp4".to_string(),
                    "video/webm".to_string(),
                    "video/quicktime".to_string(),
                ]),
                endpoint_path: "/api/v1/messages/video".to_string(),
                field_name: "video".to_string(),
                progress_phases: ProgressPhases {
                    fast_end_pct: 50.0,
                    slow_end_pct: 85.0,
                    tick_interval_ms: 300,
                },
                transfer_timeout_ms: 120_000,
            },
            file: CategoryConfig {
                display_name: "File".to_string(),
                max_size_bytes: 50 * 1024 * 1024,
                allowed_media_types: None,
                endpoint_path: "/api/v1/messages/file".to_string(),
                field_name: "file".to_string(),
                progress_phases: ProgressPhases {
                    fast_end_pct: 60.0,
                    slow_end_pct: 90.0,
                    tick_interval_ms: 250,
                },
                transfer_timeout_ms: 60_000,
            },
        }
    }
}

impl UploaderConfig {
    /// Load configuration from a JSON file, falling back to defaults for a
    /// missing file. Invalid settings are rejected before use.
    pub fn load(path: impl AsRef<Path>) -> UploadResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)?;
        let config: UploaderConfig = serde_json::from_str(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    pub fn category(&self, category: Category) -> &CategoryConfig {
        match category {
            Category::Image => &self.image,
            Category::Video => &self.video,
            Category::File => &self.file,
        }
    }

    pub fn validate(&self) -> UploadResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(UploadError::Config("base_url cannot be empty".to_string()));
        }

        for category in Category::ALL {
            let config = self.category(category);
            validate_category(category.as_str(), config)?;
        }

        Ok(())
    }
}

fn validate_category(name: &str, config: &CategoryConfig) -> UploadResult<()> {
    if config.max_size_bytes == 0 {
        return Err(UploadError::Config(format!(
            "{}: max_size_bytes must be greater than 0",
            name
        )));
    }

    if config.endpoint_path.is_empty() || !config.endpoint_path.starts_with('/') {
        return Err(UploadError::Config(format!(
            "{}: endpoint_path must start with '/'",
            name
        )));
    }

    if config.field_name.is_empty() {
        return Err(UploadError::Config(format!(
            "{}: field_name cannot be empty",
            name
        )));
    }

    let phases = &config.progress_phases;
    if phases.fast_end_pct <= 0.0 || phases.fast_end_pct >= phases.slow_end_pct {
        return Err(UploadError::Config(format!(
            "{}: fast_end_pct must be between 0 and slow_end_pct",
            name
        )));
    }

    if phases.slow_end_pct >= 100.0 {
        return Err(UploadError::Config(format!(
            "{}: slow_end_pct must be below 100",
            name
        )));
    }

    if phases.tick_interval_ms == 0 {
        return Err(UploadError::Config(format!(
            "{}: tick_interval_ms must be at least 1ms",
            name
        )));
    }

    if config.transfer_timeout_ms < 100 {
        return Err(UploadError::Config(format!(
            "{}: transfer_timeout_ms must be at least 100ms",
            name
        )));
    }

    if let Some(types) = &config.allowed_media_types {
        if types.is_empty() {
            return Err(UploadError::Config(format!(
                "{}: allowed_media_types must be non-empty or null for \"any\"",
                name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = UploaderConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_category_table() {
        let config = UploaderConfig::default();

        assert_eq!(config.image.max_size_mb(), 20);
        assert_eq!(config.video.max_size_mb(), 100);
        assert_eq!(config.file.max_size_mb(), 50);

        // Generic files accept any media type
        assert!(config.file.allowed_media_types.is_none());

        // Faster-expected categories carry the shorter timeouts
        assert!(config.image.transfer_timeout_ms < config.video.transfer_timeout_ms);
    }

    #[test]
    fn test_validate_rejects_bad_phases() {
        let mut config = UploaderConfig::default();
        config.image.progress_phases.fast_end_pct = 95.0;
        config.image.progress_phases.slow_end_pct = 90.0;
        assert!(config.validate().is_err());

        let mut config = UploaderConfig::default();
        config.video.progress_phases.slow_end_pct = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = UploaderConfig::default();
        config.file.endpoint_path = "no-leading-slash".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = UploaderConfig::load("definitely_missing_config.json").unwrap();
        assert_eq!(config.image.max_size_mb(), 20);
    }

    #[test]
    fn test_load_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut config = UploaderConfig::default();
        config.image.max_size_bytes = 5 * 1024 * 1024;

        let json = serde_json::to_string_pretty(&config).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = UploaderConfig::load(file.path()).unwrap();
        assert_eq!(loaded.image.max_size_mb(), 5);
    }
}

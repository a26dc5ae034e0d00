use crate::config::CategoryConfig;
use crate::errors::{UploadError, UploadResult};
use crate::types::UploadFile;

/// Check a candidate file against a category's configuration.
///
/// Checks run in order and short-circuit on the first failure: file presence,
/// size bounds, then media-type membership. No task exists yet when this runs,
/// so a failure has no queue side effects.
pub fn validate(file: &UploadFile, config: &CategoryConfig) -> UploadResult<()> {
    if file.name.trim().is_empty() || file.path.as_os_str().is_empty() {
        return Err(UploadError::validation("file", "no file selected"));
    }

    if file.size_bytes == 0 {
        return Err(UploadError::validation("size", "file is empty"));
    }

    if file.size_bytes > config.max_size_bytes {
        return Err(UploadError::validation(
            "size",
            &format!("size exceeds {}MB", config.max_size_mb()),
        ));
    }

    // A null type list is the "any" sentinel; skip the membership check.
    if let Some(allowed) = &config.allowed_media_types {
        if !allowed.iter().any(|t| t == &file.media_type) {
            return Err(UploadError::validation(
                "media_type",
                &format!(
                    "{} is not an accepted {} type",
                    file.media_type, config.display_name
                ),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploaderConfig;
    use std::path::PathBuf;

    fn test_file(name: &str, media_type: &str, size_bytes: u64) -> UploadFile {
        UploadFile {
            path: PathBuf::from(format!("/tmp/{}", name)),
            name: name.to_string(),
            media_type: media_type.to_string(),
            size_bytes,
        }
    }

    #[test]
    fn test_valid_image_passes() {
        let config = UploaderConfig::default();
        let file = test_file("cat.jpg", "image/jpeg", 2 * 1024 * 1024);
        assert!(validate(&file, &config.image).is_ok());
    }

    #[test]
    fn test_oversized_image_mentions_ceiling_in_mb() {
        let config = UploaderConfig::default();
        let file = test_file("big.jpg", "image/jpeg", 25 * 1024 * 1024);

        let err = validate(&file, &config.image).unwrap_err();
        assert!(
            err.to_string().contains("20MB"),
            "error should name the ceiling: {}",
            err
        );
    }

    #[test]
    fn test_empty_file_rejected() {
        let config = UploaderConfig::default();
        let file = test_file("empty.png", "image/png", 0);
        assert!(validate(&file, &config.image).is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        let config = UploaderConfig::default();
        let mut file = test_file("x.png", "image/png", 100);
        file.name = String::new();
        file.path = PathBuf::new();
        assert!(validate(&file, &config.image).is_err());
    }

    #[test]
    fn test_media_type_membership() {
        let config = UploaderConfig::default();

        let file = test_file("doc.pdf", "application/pdf", 1024);
        assert!(validate(&file, &config.image).is_err());

        let file = test_file("clip.mp4", "video/mp4", 1024);
        assert!(validate(&file, &config.video).is_ok());

        let file = test_file("clip.avi", "video/x-msvideo", 1024);
        assert!(validate(&file, &config.video).is_err());
    }

    #[test]
    fn test_any_sentinel_accepts_everything() {
        let config = UploaderConfig::default();
        assert!(config.file.allowed_media_types.is_none());

        let file = test_file("archive.zip", "application/zip", 1024);
        assert!(validate(&file, &config.file).is_ok());

        let file = test_file("blob.bin", "application/octet-stream", 1024);
        assert!(validate(&file, &config.file).is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        // Oversized AND wrong type: the size error is reported.
        let config = UploaderConfig::default();
        let file = test_file("big.pdf", "application/pdf", 30 * 1024 * 1024);

        let err = validate(&file, &config.image).unwrap_err();
        assert!(err.to_string().contains("size exceeds"));
    }
}

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::errors::UploadResult;
use crate::types::{Category, UploadFile};

/// Category-specific preview metadata, owned by the task that produced it.
///
/// The video thumbnail is a transient file under the preview temp directory;
/// `release` deletes it when the task reaches a terminal state. The `url`
/// fields point at the caller's source file and are never deleted here.
#[derive(Debug, Clone)]
pub enum PreviewInfo {
    Image {
        url: String,
        width: Option<u32>,
        height: Option<u32>,
        size_bytes: u64,
        name: String,
        media_type: String,
    },
    Video {
        thumbnail: Option<String>,
        url: String,
        duration_sec: f64,
        width: Option<u32>,
        height: Option<u32>,
        size_bytes: u64,
        name: String,
        media_type: String,
    },
    File {
        icon: String,
        extension: String,
        size_bytes: u64,
        name: String,
        media_type: String,
    },
}

impl PreviewInfo {
    /// Release transient preview resources. Idempotent; safe to call on
    /// previews that own nothing.
    pub fn release(&mut self) {
        if let PreviewInfo::Video { thumbnail, .. } = self {
            if let Some(path) = thumbnail.take() {
                if let Err(e) = std::fs::remove_file(&path) {
                    log::warn!("Failed to remove thumbnail {}: {}", path, e);
                } else {
                    log::debug!("Removed thumbnail {}", path);
                }
            }
        }
    }
}

/// Generate preview metadata for a file in the given category.
///
/// Image and video previews degrade on decode/probe failure instead of
/// rejecting; generic-file previews only inspect name and type metadata and
/// cannot fail.
pub async fn generate(file: &UploadFile, category: Category) -> UploadResult<PreviewInfo> {
    match category {
        Category::Image => image_preview(file).await,
        Category::Video => Ok(video_preview(file).await),
        Category::File => Ok(file_preview(file)),
    }
}

async fn image_preview(file: &UploadFile) -> UploadResult<PreviewInfo> {
    let bytes = tokio::fs::read(&file.path).await?;

    let dimensions = match image::load_from_memory(&bytes) {
        Ok(img) => Some((img.width(), img.height())),
        Err(e) => {
            // Degrade to a dimensionless preview rather than failing the upload.
            log::warn!("Failed to decode image {}: {}", file.name, e);
            None
        }
    };

    Ok(PreviewInfo::Image {
        url: file.path.to_string_lossy().to_string(),
        width: dimensions.map(|(w, _)| w),
        height: dimensions.map(|(_, h)| h),
        size_bytes: file.size_bytes,
        name: file.name.clone(),
        media_type: file.media_type.clone(),
    })
}

/// Seek offset for the video thumbnail frame.
const THUMBNAIL_SEEK_SEC: f64 = 1.0;

async fn video_preview(file: &UploadFile) -> PreviewInfo {
    let (duration_sec, width, height) = match probe_video(&file.path).await {
        Ok(probe) => probe,
        Err(e) => {
            log::warn!("Failed to probe video {}: {}", file.name, e);
            (0.0, None, None)
        }
    };

    let thumbnail = match extract_video_thumbnail(&file.path, THUMBNAIL_SEEK_SEC).await {
        Ok(path) => Some(path.to_string_lossy().to_string()),
        Err(e) => {
            // Best-effort: duration/size/name are still returned.
            log::warn!("Failed to extract thumbnail for {}: {}", file.name, e);
            None
        }
    };

    PreviewInfo::Video {
        thumbnail,
        url: file.path.to_string_lossy().to_string(),
        duration_sec,
        width,
        height,
        size_bytes: file.size_bytes,
        name: file.name.clone(),
        media_type: file.media_type.clone(),
    }
}

fn file_preview(file: &UploadFile) -> PreviewInfo {
    PreviewInfo::File {
        icon: icon_for_media_type(&file.media_type).to_string(),
        extension: file.extension(),
        size_bytes: file.size_bytes,
        name: file.name.clone(),
        media_type: file.media_type.clone(),
    }
}

/// Icon classifier for generic-file previews, by fixed precedence.
pub fn icon_for_media_type(media_type: &str) -> &'static str {
    let t = media_type.to_lowercase();

    if t.contains("image") {
        "icon-image"
    } else if t.contains("video") {
        "icon-video"
    } else if t.contains("audio") {
        "icon-audio"
    } else if t.contains("pdf") {
        "icon-pdf"
    } else if t.contains("word") || t.contains("doc") {
        "icon-word"
    } else if t.contains("excel") || t.contains("sheet") {
        "icon-excel"
    } else if t.contains("powerpoint") {
        "icon-ppt"
    } else if t.contains("zip") || t.contains("rar") || t.contains("compressed") {
        "icon-archive"
    } else if t.contains("text") {
        "icon-text"
    } else if t.contains("script") || t.contains("json") || t.contains("markup") || t.contains("style")
    {
        "icon-code"
    } else {
        "icon-file"
    }
}

/// Probe a video with ffprobe: (duration seconds, width, height).
async fn probe_video(path: &Path) -> UploadResult<(f64, Option<u32>, Option<u32>)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(crate::errors::UploadError::preview(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let probe: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let duration = probe["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let stream = &probe["streams"][0];
    let width = stream["width"].as_u64().map(|w| w as u32);
    let height = stream["height"].as_u64().map(|h| h as u32);

    Ok((duration, width, height))
}

/// Rasterize one frame at `seek_sec` into a JPEG at source resolution.
async fn extract_video_thumbnail(path: &Path, seek_sec: f64) -> UploadResult<PathBuf> {
    let out_path = preview_temp_path("jpg")?;

    let output = Command::new("ffmpeg")
        .args(["-ss", &seek_sec.to_string(), "-i"])
        .arg(path)
        .args(["-vframes", "1", "-q:v", "2", "-y"])
        .arg(&out_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(crate::errors::UploadError::preview(format!(
            "ffmpeg thumbnail extraction failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(out_path)
}

fn preview_temp_path(extension: &str) -> UploadResult<PathBuf> {
    let temp_dir = std::env::temp_dir().join("chat_attachment_previews");
    std::fs::create_dir_all(&temp_dir)?;

    let name = uuid::Uuid::new_v4().to_string();
    Ok(temp_dir.join(format!("{}.{}", name, extension)))
}

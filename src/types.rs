use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{UploadError, UploadResult};

/// Closed set of upload categories. Each category binds its own validation
/// rules, endpoint and progress tuning through the configuration registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Image,
    Video,
    File,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Image, Category::Video, Category::File];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Video => "video",
            Category::File => "file",
        }
    }

    pub fn parse(name: &str) -> UploadResult<Self> {
        match name {
            "image" => Ok(Category::Image),
            "video" => Ok(Category::Video),
            "file" => Ok(Category::File),
            other => Err(UploadError::UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate file for upload: local path plus the metadata validation and
/// preview extraction operate on.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub path: PathBuf,
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
}

impl UploadFile {
    /// Build from a filesystem path, reading the size from the file and
    /// guessing the media type from the extension.
    pub async fn from_path(path: impl Into<PathBuf>) -> UploadResult<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let media_type = media_type_for_path(&path).to_string();

        Ok(Self {
            size_bytes: metadata.len(),
            path,
            name,
            media_type,
        })
    }

    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_uppercase(),
            _ => String::new(),
        }
    }
}

/// Detect media type based on file extension
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("pdf") => "application/pdf",
        Some("doc") | Some("docx") => "application/msword",
        Some("xls") | Some("xlsx") => "application/vnd.ms-excel",
        Some("ppt") | Some("pptx") => "application/vnd.ms-powerpoint",
        Some("zip") => "application/zip",
        Some("rar") => "application/vnd.rar",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => "application/octet-stream",
    }
}

/// Task status while tracked by the manager. Terminal statuses are observable
/// only through callbacks; terminal tasks leave the queue immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Sending,
    Success,
    Failed,
}

/// Sender identity stamped onto provisional messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Caller-supplied parameters for one upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub room_id: String,
    pub token: String,
    pub user_info: UserInfo,
}

/// Locally synthesized, not-yet-server-confirmed outgoing message, shown
/// optimistically in the UI while the transfer is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalMessage {
    pub client_id: String,
    pub message_type: String,
    pub status: Status,
    pub sender: UserInfo,
    pub room_id: String,
    #[serde(flatten)]
    pub body: ProvisionalBody,
}

/// Category-specific preview fields carried by the provisional message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProvisionalBody {
    #[serde(rename_all = "camelCase")]
    Image {
        image_url: String,
        width: Option<u32>,
        height: Option<u32>,
        name: String,
        size_bytes: u64,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        thumbnail: Option<String>,
        video_url: String,
        duration_sec: f64,
        name: String,
        size_bytes: u64,
    },
    #[serde(rename_all = "camelCase")]
    File {
        name: String,
        size_bytes: u64,
        extension: String,
        icon: String,
    },
}

/// Server-assigned message descriptor from a successful transfer.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub message_id: String,
    pub message: serde_json::Value,
}

/// Payload for the success callback.
#[derive(Debug, Clone)]
pub struct UploadSuccess {
    pub task_id: String,
    pub message_id: String,
    pub message: serde_json::Value,
    pub provisional_message: ProvisionalMessage,
}

/// Payload for the failure callback.
#[derive(Debug, Clone)]
pub struct UploadFailure {
    pub task_id: String,
    pub error: String,
    pub provisional_message: Option<ProvisionalMessage>,
    pub cancelled: bool,
}

/// Point-in-time queue snapshot. Completed tasks are removed in the same step
/// their terminal callback fires, so success/failed reflect only a narrow
/// in-flight window; best-effort, not history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    pub sending: usize,
    pub success: usize,
    pub failed: usize,
}

pub type ProgressCallback = Box<dyn Fn(&str, f32) + Send + Sync>;
pub type SuccessCallback = Box<dyn Fn(&UploadSuccess) + Send + Sync>;
pub type FailureCallback = Box<dyn Fn(&UploadFailure) + Send + Sync>;
pub type StatusCallback = Box<dyn Fn(&str, Status, Option<&ProvisionalMessage>) + Send + Sync>;

/// Caller-registered lifecycle callbacks. A single set is registered at a
/// time; registering again replaces the previous set. All four are optional.
#[derive(Default)]
pub struct UploadCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_success: Option<SuccessCallback>,
    pub on_failed: Option<FailureCallback>,
    pub on_status_change: Option<StatusCallback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("image").unwrap(), Category::Image);
        assert_eq!(Category::parse("video").unwrap(), Category::Video);
        assert_eq!(Category::parse("file").unwrap(), Category::File);

        match Category::parse("audio") {
            Err(UploadError::UnknownCategory(name)) => assert_eq!(name, "audio"),
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_extension_derivation() {
        let file = UploadFile {
            path: PathBuf::from("/tmp/report.final.pdf"),
            name: "report.final.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            size_bytes: 10,
        };
        assert_eq!(file.extension(), "PDF");

        let file = UploadFile {
            path: PathBuf::from("/tmp/Makefile"),
            name: "Makefile".to_string(),
            media_type: "application/octet-stream".to_string(),
            size_bytes: 10,
        };
        assert_eq!(file.extension(), "");
    }

    #[test]
    fn test_media_type_guess() {
        assert_eq!(media_type_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("a.mp4")), "video/mp4");
        assert_eq!(media_type_for_path(Path::new("a.zip")), "application/zip");
        assert_eq!(media_type_for_path(Path::new("a.html")), "text/html");
        assert_eq!(media_type_for_path(Path::new("a.css")), "text/css");
        assert_eq!(
            media_type_for_path(Path::new("noext")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_provisional_message_serializes_camel_case() {
        let message = ProvisionalMessage {
            client_id: "t1".to_string(),
            message_type: "image".to_string(),
            status: Status::Sending,
            sender: UserInfo {
                user_id: "u7".to_string(),
                display_name: "Kim".to_string(),
                avatar_url: None,
            },
            room_id: "7".to_string(),
            body: ProvisionalBody::Image {
                image_url: "/tmp/cat.jpg".to_string(),
                width: Some(640),
                height: Some(480),
                name: "cat.jpg".to_string(),
                size_bytes: 2048,
            },
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"imageUrl\""));
        assert!(json.contains("\"clientId\""));
        assert!(json.contains("\"sending\""));
    }
}

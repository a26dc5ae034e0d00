use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{CategoryConfig, UploaderConfig};
use crate::errors::{UploadError, UploadResult};
use crate::preview::{self, PreviewInfo};
use crate::transfer::TransferClient;
use crate::types::{
    Category, ProvisionalBody, ProvisionalMessage, Status, TransferResult, UploadFile,
    UploadOptions, UserInfo,
};
use crate::validator;

/// Capability set of one upload category: validation, preview extraction, the
/// network transfer and provisional-message shaping. Each variant binds one
/// configuration registry entry.
#[async_trait]
pub trait UploadHandler: Send + Sync {
    fn category(&self) -> Category;
    fn config(&self) -> &CategoryConfig;
    fn client(&self) -> &TransferClient;

    /// Wire-level message type constant for this variant.
    fn message_type(&self) -> &'static str {
        self.category().as_str()
    }

    fn validate(&self, file: &UploadFile) -> UploadResult<()> {
        validator::validate(file, self.config())
    }

    async fn generate_preview(&self, file: &UploadFile) -> UploadResult<PreviewInfo> {
        preview::generate(file, self.category()).await
    }

    /// Multipart POST to the category endpoint, bounded by the category
    /// timeout and abortable through the task's cancellation token.
    async fn upload(
        &self,
        file: &UploadFile,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> UploadResult<TransferResult> {
        if options.room_id.trim().is_empty() {
            return Err(UploadError::missing_parameter("room_id"));
        }

        let config = self.config();
        self.client()
            .send_multipart(
                &config.endpoint_path,
                &config.field_name,
                file,
                &options.room_id,
                &options.token,
                config.transfer_timeout_ms,
                cancel,
            )
            .await
    }

    fn build_provisional_message(
        &self,
        task_id: &str,
        preview: &PreviewInfo,
        user_info: &UserInfo,
        room_id: &str,
    ) -> ProvisionalMessage {
        ProvisionalMessage {
            client_id: task_id.to_string(),
            message_type: self.message_type().to_string(),
            status: Status::Sending,
            sender: user_info.clone(),
            room_id: room_id.to_string(),
            body: body_for_preview(preview),
        }
    }
}

fn body_for_preview(preview: &PreviewInfo) -> ProvisionalBody {
    match preview {
        PreviewInfo::Image {
            url,
            width,
            height,
            name,
            size_bytes,
            ..
        } => ProvisionalBody::Image {
            image_url: url.clone(),
            width: *width,
            height: *height,
            name: name.clone(),
            size_bytes: *size_bytes,
        },
        PreviewInfo::Video {
            thumbnail,
            url,
            duration_sec,
            name,
            size_bytes,
            ..
        } => ProvisionalBody::Video {
            thumbnail: thumbnail.clone(),
            video_url: url.clone(),
            duration_sec: *duration_sec,
            name: name.clone(),
            size_bytes: *size_bytes,
        },
        PreviewInfo::File {
            icon,
            extension,
            name,
            size_bytes,
            ..
        } => ProvisionalBody::File {
            name: name.clone(),
            size_bytes: *size_bytes,
            extension: extension.clone(),
            icon: icon.clone(),
        },
    }
}

pub struct ImageHandler {
    config: CategoryConfig,
    client: Arc<TransferClient>,
}

impl ImageHandler {
    pub fn new(config: CategoryConfig, client: Arc<TransferClient>) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl UploadHandler for ImageHandler {
    fn category(&self) -> Category {
        Category::Image
    }

    fn config(&self) -> &CategoryConfig {
        &self.config
    }

    fn client(&self) -> &TransferClient {
        &self.client
    }
}

pub struct VideoHandler {
    config: CategoryConfig,
    client: Arc<TransferClient>,
}

impl VideoHandler {
    pub fn new(config: CategoryConfig, client: Arc<TransferClient>) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl UploadHandler for VideoHandler {
    fn category(&self) -> Category {
        Category::Video
    }

    fn config(&self) -> &CategoryConfig {
        &self.config
    }

    fn client(&self) -> &TransferClient {
        &self.client
    }
}

pub struct FileHandler {
    config: CategoryConfig,
    client: Arc<TransferClient>,
}

impl FileHandler {
    pub fn new(config: CategoryConfig, client: Arc<TransferClient>) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl UploadHandler for FileHandler {
    fn category(&self) -> Category {
        Category::File
    }

    fn config(&self) -> &CategoryConfig {
        &self.config
    }

    fn client(&self) -> &TransferClient {
        &self.client
    }
}

/// Closed lookup table from category to its handler. Built once per manager.
pub struct HandlerRegistry {
    handlers: HashMap<Category, Arc<dyn UploadHandler>>,
}

impl HandlerRegistry {
    pub fn new(config: &UploaderConfig) -> UploadResult<Self> {
        let client = Arc::new(TransferClient::new(config.base_url.clone())?);

        let mut handlers: HashMap<Category, Arc<dyn UploadHandler>> = HashMap::new();
        handlers.insert(
            Category::Image,
            Arc::new(ImageHandler::new(config.image.clone(), Arc::clone(&client))),
        );
        handlers.insert(
            Category::Video,
            Arc::new(VideoHandler::new(config.video.clone(), Arc::clone(&client))),
        );
        handlers.insert(
            Category::File,
            Arc::new(FileHandler::new(config.file.clone(), Arc::clone(&client))),
        );

        Ok(Self { handlers })
    }

    pub fn get(&self, category: Category) -> Arc<dyn UploadHandler> {
        // The map is seeded with every Category variant in new().
        Arc::clone(&self.handlers[&category])
    }
}

//! Attachment upload orchestration for chat clients.
//!
//! The entry point is [`UploadManager`]: callers hand it an [`UploadFile`],
//! a [`Category`] and per-call [`UploadOptions`], and observe the task
//! lifecycle through [`UploadCallbacks`]. Each category routes through its
//! own handler, which validates the file, extracts preview metadata, shapes
//! the optimistic provisional message and runs the multipart transfer.
//! Progress is simulated on a timer because the transport exposes no
//! byte-level signal.

pub mod config;
pub mod errors;
pub mod handler;
pub mod manager;
pub mod preview;
pub mod progress;
pub mod transfer;
pub mod types;
pub mod validator;

pub use config::{CategoryConfig, ProgressPhases, UploaderConfig};
pub use errors::{UploadError, UploadResult};
pub use handler::{HandlerRegistry, UploadHandler};
pub use manager::{UploadManager, UploadOutcome};
pub use preview::PreviewInfo;
pub use types::{
    Category, ProvisionalBody, ProvisionalMessage, QueueStatus, Status, TransferResult,
    UploadCallbacks, UploadFailure, UploadFile, UploadOptions, UploadSuccess, UserInfo,
};

use reqwest::{multipart, Client};
use serde::Deserialize;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{UploadError, UploadResult};
use crate::types::{TransferResult, UploadFile};

/// Response envelope returned by the message endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    msg: Option<String>,
    data: Option<serde_json::Value>,
}

/// HTTP client for the multipart message endpoints. One instance is shared
/// by every handler; per-category limits are passed per call.
pub struct TransferClient {
    client: Client,
    base_url: String,
}

impl TransferClient {
    pub fn new(base_url: impl Into<String>) -> UploadResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// POST the file as a multipart form to `endpoint_path`, bounded by
    /// `timeout_ms` and abortable through `cancel`. The transport exposes no
    /// byte-level progress; completion is the only signal.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_multipart(
        &self,
        endpoint_path: &str,
        field_name: &str,
        file: &UploadFile,
        room_id: &str,
        token: &str,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> UploadResult<TransferResult> {
        let url = format!("{}{}", self.base_url, endpoint_path);

        let file_contents = tokio::fs::read(&file.path).await?;
        let part = multipart::Part::bytes(file_contents)
            .file_name(file.name.clone())
            .mime_str(&file.media_type)?;

        let form = multipart::Form::new()
            .text("room_id", room_id.to_string())
            .part(field_name.to_string(), part);

        log::debug!(
            "POST {} ({} bytes as {})",
            url,
            file.size_bytes,
            field_name
        );

        // The whole exchange, body read included, must stay inside the
        // select so a trickled response body is still bounded.
        let exchange = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(token)
                .multipart(form)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            Ok::<_, UploadError>((status, body))
        };

        let (status, body) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Transfer to {} aborted by cancellation", url);
                return Err(UploadError::Cancelled);
            }
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                log::warn!("Transfer to {} exceeded {}ms", url, timeout_ms);
                return Err(UploadError::Timeout { timeout_ms });
            }
            result = exchange => result?,
        };

        if !status.is_success() {
            return Err(UploadError::transfer(format!(
                "server returned HTTP {}: {}",
                status,
                body.lines().next().unwrap_or("")
            )));
        }

        parse_envelope(&body)
    }
}

fn parse_envelope(body: &str) -> UploadResult<TransferResult> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| UploadError::transfer(format!("unparseable server response: {}", e)))?;

    if envelope.code != 0 {
        let msg = envelope
            .msg
            .unwrap_or_else(|| format!("upload rejected with code {}", envelope.code));
        return Err(UploadError::transfer(msg));
    }

    let message = envelope
        .data
        .ok_or_else(|| UploadError::transfer("response missing data"))?;

    let message_id = match message.get("id") {
        Some(serde_json::Value::String(id)) => id.clone(),
        Some(serde_json::Value::Number(id)) => id.to_string(),
        _ => return Err(UploadError::transfer("response data missing id")),
    };

    Ok(TransferResult {
        message_id,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> UploadFile {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"payload bytes").unwrap();

        UploadFile {
            path: path.clone(),
            name: name.to_string(),
            media_type: "image/png".to_string(),
            size_bytes: 13,
        }
    }

    #[test]
    fn test_parse_envelope_success() {
        let result = parse_envelope(r#"{"code":0,"data":{"id":"m1","room_id":7}}"#).unwrap();
        assert_eq!(result.message_id, "m1");
        assert_eq!(result.message["room_id"], 7);
    }

    #[test]
    fn test_parse_envelope_numeric_id() {
        let result = parse_envelope(r#"{"code":0,"data":{"id":42}}"#).unwrap();
        assert_eq!(result.message_id, "42");
    }

    #[test]
    fn test_parse_envelope_failure_surfaces_msg() {
        let err = parse_envelope(r#"{"code":13,"msg":"room is read-only","data":{}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Upload failed: room is read-only");
    }

    #[test]
    fn test_parse_envelope_rejects_missing_id() {
        assert!(parse_envelope(r#"{"code":0,"data":{}}"#).is_err());
        assert!(parse_envelope(r#"{"code":0}"#).is_err());
        assert!(parse_envelope("not json").is_err());
    }

    #[tokio::test]
    async fn test_send_multipart_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/messages/image")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"id":"m1"}}"#)
            .create_async()
            .await;

        let client = TransferClient::new(server.url()).unwrap();
        let file = scratch_file("transfer_test_ok.png");
        let cancel = CancellationToken::new();

        let result = client
            .send_multipart(
                "/api/v1/messages/image",
                "image",
                &file,
                "7",
                "abc",
                5_000,
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(result.message_id, "m1");
        mock.assert_async().await;
        let _ = std::fs::remove_file(&file.path);
    }

    #[tokio::test]
    async fn test_send_multipart_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/messages/file")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = TransferClient::new(server.url()).unwrap();
        let file = scratch_file("transfer_test_500.png");
        let cancel = CancellationToken::new();

        let err = client
            .send_multipart(
                "/api/v1/messages/file",
                "file",
                &file,
                "7",
                "abc",
                5_000,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("HTTP 500"));
        let _ = std::fs::remove_file(&file.path);
    }

    #[tokio::test]
    async fn test_send_multipart_times_out_on_stalled_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/messages/file")
            .with_status(200)
            .with_chunked_body(|writer| {
                // Headers go out promptly; the body trickles in late.
                std::thread::sleep(Duration::from_millis(800));
                writer.write_all(br#"{"code":0,"data":{"id":"late"}}"#)
            })
            .create_async()
            .await;

        let client = TransferClient::new(server.url()).unwrap();
        let file = scratch_file("transfer_test_stall.png");
        let cancel = CancellationToken::new();

        let err = client
            .send_multipart(
                "/api/v1/messages/file",
                "file",
                &file,
                "7",
                "abc",
                200,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "stalled body must surface a timeout: {}", err);
        let _ = std::fs::remove_file(&file.path);
    }

    #[tokio::test]
    async fn test_send_multipart_cancelled_during_body_read() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/messages/file")
            .with_status(200)
            .with_chunked_body(|writer| {
                std::thread::sleep(Duration::from_millis(800));
                writer.write_all(br#"{"code":0,"data":{"id":"late"}}"#)
            })
            .create_async()
            .await;

        let client = TransferClient::new(server.url()).unwrap();
        let file = scratch_file("transfer_test_body_cancel.png");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .send_multipart(
                "/api/v1/messages/file",
                "file",
                &file,
                "7",
                "abc",
                10_000,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        let _ = std::fs::remove_file(&file.path);
    }

    #[tokio::test]
    async fn test_send_multipart_missing_file() {
        let client = TransferClient::new("http://localhost:1").unwrap();
        let file = UploadFile {
            path: PathBuf::from("/definitely/missing/file.png"),
            name: "file.png".to_string(),
            media_type: "image/png".to_string(),
            size_bytes: 1,
        };
        let cancel = CancellationToken::new();

        let err = client
            .send_multipart("/x", "file", &file, "7", "abc", 1_000, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }

    #[tokio::test]
    async fn test_send_multipart_cancelled_before_send() {
        let client = TransferClient::new("http://localhost:1").unwrap();
        let file = scratch_file("transfer_test_cancel.png");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .send_multipart("/x", "file", &file, "7", "abc", 10_000, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        let _ = std::fs::remove_file(&file.path);
    }
}

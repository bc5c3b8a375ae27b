//! Report delivery to the operator chat.
//!
//! Best-effort, single-attempt upload; the archive is removed only on
//! an accepted upload.

use crate::credentials::Credentials;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use znn_diag_common::{Error, Result};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_CAPTION: &str = "znnd node diagnostic report";

/// Literal marker the chat API includes in an accepted response.
pub const SUCCESS_MARKER: &str = "\"ok\":true";

/// Outcome of one delivery attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Upload accepted; the local archive was removed.
    Delivered,
    /// Upload answered but rejected; archive retained.
    Rejected,
}

/// Whether a response body signals acceptance.
pub fn upload_accepted(body: &str) -> bool {
    body.contains(SUCCESS_MARKER)
}

pub struct Delivery {
    client: reqwest::Client,
}

impl Delivery {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// Upload the archive as a document attachment.
    pub async fn send(
        &self,
        credentials: &Credentials,
        archive_path: &Path,
    ) -> Result<DeliveryStatus> {
        let bytes = tokio::fs::read(archive_path).await?;
        let file_name = archive_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("report.tar.gz")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .text("chat_id", credentials.chat_id.to_string())
            .text("caption", UPLOAD_CAPTION)
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let url = format!(
            "https://api.telegram.org/bot{}/sendDocument",
            credentials.bot_token.as_str()
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Upload(e.to_string()))?;

        if upload_accepted(&body) {
            tokio::fs::remove_file(archive_path).await?;
            info!("Report delivered; local archive removed");
            Ok(DeliveryStatus::Delivered)
        } else {
            Ok(DeliveryStatus::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_marker_matches_api_response() {
        assert!(upload_accepted(
            r#"{"ok":true,"result":{"message_id":42}}"#
        ));
    }

    #[test]
    fn test_rejections_are_not_accepted() {
        assert!(!upload_accepted(
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#
        ));
        assert!(!upload_accepted("<html>502 Bad Gateway</html>"));
        assert!(!upload_accepted(""));
    }
}

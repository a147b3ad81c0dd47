use std::time::Duration;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use url::Url;
use super::errors::{QueueError, Result};
use super::types::StagedFile;

/// Destination for staged image bytes. The production implementation talks
/// to the wardrobe backend; tests substitute their own.
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Push one image and return the backend-assigned resource id.
    async fn submit(&self, file: &StagedFile) -> Result<String>;
}

/// HTTP client for the wardrobe item submission endpoint. One image per
/// call, nothing but the bytes: categorization and naming are inferred
/// server-side.
#[derive(Debug, Clone)]
pub struct WardrobeClient {
    client: Client,
    endpoint: Url,
}

impl WardrobeClient {
    /// Connect timeout only. The coordinator enforces no per-request
    /// deadline, so a hung transfer holds its slot until the server or the
    /// OS gives up.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ImageSink for WardrobeClient {
    async fn submit(&self, file: &StagedFile) -> Result<String> {
        let part = Part::stream(reqwest::Body::from(file.bytes.clone()))
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(QueueError::server_error(
                status.as_u16(),
                extract_error_message(&body)
                    .unwrap_or_else(|| format!("upload failed with status {}", status)),
            ));
        }

        parse_result_id(&body).ok_or_else(|| {
            QueueError::server_error(status.as_u16(), "response missing resource id")
        })
    }
}

/// The backend has drifted between `id` and `item_id` over time; accept
/// either.
fn parse_result_id(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let id = value.get("id").or_else(|| value.get("item_id"))?;

    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Structured message from an error body, when the backend sent one.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_id_under_either_field_name() {
        assert_eq!(parse_result_id(r#"{"id":"abc"}"#), Some("abc".to_string()));
        assert_eq!(
            parse_result_id(r#"{"item_id":"xyz"}"#),
            Some("xyz".to_string())
        );
        assert_eq!(parse_result_id(r#"{"id":42}"#), Some("42".to_string()));
        assert_eq!(parse_result_id(r#"{"name":"abc"}"#), None);
        assert_eq!(parse_result_id("not json"), None);
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"message":"too blurry"}"#),
            Some("too blurry".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"error":"unsupported format"}"#),
            Some("unsupported format".to_string())
        );
        assert_eq!(extract_error_message(r#"{"code":500}"#), None);
        assert_eq!(extract_error_message(""), None);
    }

    #[test]
    fn rejects_bad_endpoint() {
        assert!(WardrobeClient::new("not a url").is_err());
        assert!(WardrobeClient::new("https://api.example.com/wardrobe/items").is_ok());
    }
}

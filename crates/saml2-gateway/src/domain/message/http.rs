use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::domain::user::LocalUser;

use super::{MessageError, MessageErrorKind, Record, RecordKind, RequestMessageProcessor};

/// Forwards request messages to the clinical application that owns HL7 parsing.
pub(crate) struct HttpRequestMessageProcessor {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRequestMessageProcessor {
    pub fn new(endpoint: Url) -> Self {
        Self { client: reqwest::Client::new(), endpoint }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequestPayload<'a> {
    message: &'a str,
    user_id: i64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreatedRecordResponse {
    record_type: Option<String>,
    record_id: Option<RecordIdResponse>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RecordIdResponse {
    Number(i64),
    Text(String),
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    code: String,
    message: String,
}

#[async_trait]
impl RequestMessageProcessor for HttpRequestMessageProcessor {
    async fn create_request(&self, raw_message: &str, user: &LocalUser) -> Result<Option<Record>, MessageError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&CreateRequestPayload { message: raw_message, user_id: user.id })
            .send()
            .await
            .map_err(|e| MessageError::new(MessageErrorKind::Other, e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MessageError::new(MessageErrorKind::Other, e.to_string()))?;
        debug!(%status, "message processor responded.");

        if status.is_success() {
            record_from_body(&body)
        } else {
            Err(error_from_body(status, &body))
        }
    }
}

fn record_from_body(body: &str) -> Result<Option<Record>, MessageError> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let response: Option<CreatedRecordResponse> = serde_json::from_str(body)
        .map_err(|e| MessageError::new(MessageErrorKind::Other, format!("invalid message processor response: {e}")))?;

    Ok(response.and_then(|response| {
        let id = match response.record_id? {
            RecordIdResponse::Number(id) => id.to_string(),
            RecordIdResponse::Text(id) => id,
        };
        let kind = RecordKind::from_type_name(response.record_type.as_deref().unwrap_or_default());
        Some(Record { kind, id })
    }))
}

fn error_from_body(status: reqwest::StatusCode, body: &str) -> MessageError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(error) => MessageError::new(MessageErrorKind::from_code(&error.code), error.message),
        Err(_) => {
            warn!(%status, "message processor returned an unstructured error.");
            MessageError::new(MessageErrorKind::Other, format!("message processor failed with status {status}"))
        }
    }
}

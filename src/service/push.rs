//! Push gateway contract and the Expo implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::notificationmodel::{NotificationType, TicketOutcome};

/// Largest number of messages Expo accepts in one request.
pub const PUSH_BATCH_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Transport(String),

    #[error("push gateway rejected the batch: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
    pub notification_id: Uuid,
    pub job_id: Option<Uuid>,
}

#[async_trait]
pub trait PushGateway: std::fmt::Debug + Send + Sync {
    /// One outcome per token, in token order.
    async fn publish(&self, tokens: &[String], payload: &PushPayload) -> Result<Vec<TicketOutcome>, PushError>;
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    #[serde(default)]
    data: Vec<ExpoTicket>,
    #[serde(default)]
    errors: Vec<ExpoTicketError>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    message: Option<String>,
    details: Option<ExpoTicketDetails>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicketDetails {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpoTicketError {
    message: String,
}

fn ticket_outcome(ticket: &ExpoTicket) -> TicketOutcome {
    if ticket.status == "ok" {
        return TicketOutcome::Delivered;
    }

    let code = ticket.details.as_ref().and_then(|d| d.error.as_deref());
    match code {
        Some("DeviceNotRegistered") => TicketOutcome::DeviceNotRegistered,
        _ => TicketOutcome::Failed(
            ticket
                .message
                .clone()
                .or_else(|| code.map(str::to_string))
                .unwrap_or_else(|| "unknown push error".to_string()),
        ),
    }
}

fn parse_response(response: ExpoResponse) -> Result<Vec<TicketOutcome>, PushError> {
    if response.data.is_empty() && !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(PushError::Rejected(messages.join("; ")));
    }
    Ok(response.data.iter().map(ticket_outcome).collect())
}

#[derive(Debug, Clone)]
pub struct ExpoPushGateway {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl ExpoPushGateway {
    pub fn new(url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            access_token,
        }
    }
}

#[async_trait]
impl PushGateway for ExpoPushGateway {
    async fn publish(&self, tokens: &[String], payload: &PushPayload) -> Result<Vec<TicketOutcome>, PushError> {
        let data = serde_json::json!({
            "type": payload.notification_type,
            "notificationId": payload.notification_id,
            "jobId": payload.job_id,
        });
        let messages: Vec<ExpoMessage> = tokens
            .iter()
            .map(|token| ExpoMessage {
                to: token,
                title: &payload.title,
                body: &payload.body,
                sound: "default",
                data: data.clone(),
            })
            .collect();

        let mut request = self.client.post(&self.url).json(&messages);
        if let Some(access_token) = &self.access_token {
            request = request.bearer_auth(access_token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected(format!("{}: {}", status, body)));
        }

        let body: ExpoResponse = response
            .json()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        parse_response(body)
    }
}

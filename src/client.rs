//! Gmail mailbox access: message listing and retrieval

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use google_gmail1::api::{Message, MessagePart};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, READONLY_SCOPES};
use crate::error::{GmailError, Result};
use crate::models::{BodyPart, MessageBody, MessageHeader, RawMessage};

/// Upper bound on a single Gmail API call
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailbox operations the digest pipeline needs
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List up to `max_results` message ids matching a Gmail search query, newest first
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;

    /// Retrieve one message with headers and body parts
    async fn get_message(&self, id: &str) -> Result<RawMessage>;

    /// Address of the authenticated account
    async fn email_address(&self) -> Result<String>;
}

/// Gmail API client over an authenticated hub
pub struct ProductionGmailClient {
    hub: GmailHub,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self { hub }
    }

    /// Get the inner hub reference
    pub fn hub(&self) -> &GmailHub {
        &self.hub
    }

    async fn with_timeout<T, F>(operation_name: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, google_gmail1::Error>>,
    {
        match tokio::time::timeout(API_TIMEOUT, call).await {
            Ok(result) => result.map_err(GmailError::from),
            Err(_) => {
                warn!("Gmail API {} call timed out after {:?}", operation_name, API_TIMEOUT);
                Err(GmailError::NetworkError(format!(
                    "API call timed out after {:?}",
                    API_TIMEOUT
                )))
            }
        }
    }
}

/// Convert an API message into a [`RawMessage`]
///
/// Headers and top-level parts keep their API order. Body data arrives
/// decoded from the client library and is re-encoded as base64url so the
/// normalizer sees the same form as the wire. A message without a payload
/// becomes a header-less message with an empty body.
pub fn raw_message_from_gmail(id: &str, message: Message) -> RawMessage {
    let id = message.id.unwrap_or_else(|| id.to_string());

    let Some(mut payload) = message.payload else {
        return RawMessage {
            id,
            headers: Vec::new(),
            body: MessageBody::default(),
        };
    };

    let headers = payload
        .headers
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| match (h.name, h.value) {
            (Some(name), Some(value)) => Some(MessageHeader { name, value }),
            _ => None,
        })
        .collect();

    let body = match payload.parts.take() {
        Some(parts) => MessageBody::Parts(
            parts
                .into_iter()
                .map(|part| BodyPart {
                    mime_type: part.mime_type.clone().unwrap_or_default(),
                    data: encoded_body(&part),
                })
                .collect(),
        ),
        None => MessageBody::Single(encoded_body(&payload)),
    };

    RawMessage { id, headers, body }
}

fn encoded_body(part: &MessagePart) -> String {
    part.body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .map(|bytes| URL_SAFE.encode(bytes))
        .unwrap_or_default()
}

#[async_trait]
impl MailboxClient for ProductionGmailClient {
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let mut call = self
            .hub
            .users()
            .messages_list("me")
            .max_results(max_results);

        if !query.is_empty() {
            call = call.q(query);
        }

        let (_, response) = Self::with_timeout(
            "messages.list",
            call.add_scope(READONLY_SCOPES[0]).doit(),
        )
        .await?;

        let ids: Vec<String> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        debug!(query, count = ids.len(), "Listed message ids");
        Ok(ids)
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage> {
        let call = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(READONLY_SCOPES[0])
            .doit();

        let (_, message) = Self::with_timeout("messages.get", call).await?;
        Ok(raw_message_from_gmail(id, message))
    }

    async fn email_address(&self) -> Result<String> {
        let call = self
            .hub
            .users()
            .get_profile("me")
            .add_scope(READONLY_SCOPES[0])
            .doit();

        let (_, profile) = Self::with_timeout("getProfile", call).await?;
        profile
            .email_address
            .ok_or_else(|| GmailError::ApiError("Profile has no email address".to_string()))
    }
}

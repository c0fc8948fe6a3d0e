//! Builds one [`EmailRecord`] per fetched [`RawMessage`]

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotator::Annotator;
use crate::content::normalize_content;
use crate::models::{Annotation, EmailRecord, MessageBody, RawMessage};
use crate::urls::extract_urls;

pub const DEFAULT_SUBJECT: &str = "No Subject";
pub const DEFAULT_SENDER: &str = "Unknown Sender";
pub const DEFAULT_DATE: &str = "Unknown Date";

const ELLIPSIS: &str = "...";

/// Which `text/html` part to use when a multipart message has no `text/plain` part
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodySelection {
    /// The last html part encountered in scan order
    #[default]
    #[serde(rename = "last-html")]
    LastHtmlWins,
    /// The first html part encountered in scan order
    #[serde(rename = "first-html")]
    FirstHtmlWins,
}

/// Pick the payload to normalize
///
/// A `text/plain` part always wins and stops the scan, even if its payload is
/// empty. Parts of any other type are ignored. With no usable part the result
/// is the empty string.
pub fn select_body(message: &RawMessage, policy: BodySelection) -> &str {
    let parts = match &message.body {
        MessageBody::Single(data) => return data,
        MessageBody::Parts(parts) => parts,
    };

    let mut selected: Option<&str> = None;
    for part in parts {
        match part.mime_type.as_str() {
            "text/plain" => return &part.data,
            "text/html" => {
                if policy == BodySelection::LastHtmlWins || selected.is_none() {
                    selected = Some(&part.data);
                }
            }
            _ => {}
        }
    }

    selected.unwrap_or_default()
}

/// Truncate to `max_chars` characters, appending `...` only when something was cut
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], ELLIPSIS),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EmailRecordBuilder {
    preview_chars: usize,
    body_selection: BodySelection,
}

impl Default for EmailRecordBuilder {
    fn default() -> Self {
        Self {
            preview_chars: 500,
            body_selection: BodySelection::default(),
        }
    }
}

impl EmailRecordBuilder {
    pub fn new(preview_chars: usize, body_selection: BodySelection) -> Self {
        Self {
            preview_chars,
            body_selection,
        }
    }

    pub fn from_config(config: &crate::config::ContentConfig) -> Self {
        Self::new(config.preview_chars, config.body_selection)
    }

    pub fn body_selection(&self) -> BodySelection {
        self.body_selection
    }

    /// Assemble a record from a raw message, requesting an annotation when an
    /// annotator is supplied
    ///
    /// Annotation failures are logged and replaced with
    /// [`Annotation::fallback`]; building a record never fails.
    pub async fn build(
        &self,
        message: &RawMessage,
        annotator: Option<&dyn Annotator>,
    ) -> EmailRecord {
        let subject = message.header("Subject").unwrap_or(DEFAULT_SUBJECT);
        let sender = message.header("From").unwrap_or(DEFAULT_SENDER);
        let date = message.header("Date").unwrap_or(DEFAULT_DATE);

        let text = normalize_content(select_body(message, self.body_selection));
        let urls = extract_urls(&text);

        debug!(
            id = %message.id,
            chars = text.chars().count(),
            urls = urls.len(),
            "Normalized message body"
        );

        let annotation = match annotator {
            None => None,
            Some(_) if text.is_empty() => Some(Annotation::empty_content()),
            Some(annotator) => Some(match annotator.annotate(&text, subject).await {
                Ok(annotation) => annotation,
                Err(e) => {
                    warn!(id = %message.id, "Annotation failed, using fallback: {}", e);
                    Annotation::fallback(e)
                }
            }),
        };

        EmailRecord {
            id: message.id.clone(),
            subject: subject.to_string(),
            sender: sender.to_string(),
            date: date.to_string(),
            content: truncate_preview(&text, self.preview_chars),
            urls,
            annotation,
        }
    }
}

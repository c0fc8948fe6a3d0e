use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single `name: value` header as delivered by the mailbox API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One body part of a multipart message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    /// Declared MIME type, e.g. `text/plain`
    pub mime_type: String,
    /// Encoded payload (base64url on the wire); empty when the part has no data
    pub data: String,
}

impl BodyPart {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Body of a raw message: either one unparted payload or a list of parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    Single(String),
    Parts(Vec<BodyPart>),
}

impl Default for MessageBody {
    fn default() -> Self {
        MessageBody::Single(String::new())
    }
}

/// Message as retrieved from the mailbox service, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub headers: Vec<MessageHeader>,
    pub body: MessageBody,
}

impl RawMessage {
    /// Value of the first header whose name matches exactly (case-sensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

/// Sentiment reported by the annotation service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Map free-form model output onto the enum; anything unrecognized is neutral
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary metadata attached to a record by the annotation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment: Sentiment,
}

impl Annotation {
    /// Annotation substituted when the annotation service fails
    pub fn fallback(reason: impl fmt::Display) -> Self {
        Self {
            summary: format!("Error in summarization: {}", reason),
            key_points: Vec::new(),
            action_items: Vec::new(),
            sentiment: Sentiment::Neutral,
        }
    }

    /// Annotation attached when there is no text to send to the service
    pub fn empty_content() -> Self {
        Self {
            summary: "No content to summarize".to_string(),
            key_points: Vec::new(),
            action_items: Vec::new(),
            sentiment: Sentiment::Neutral,
        }
    }
}

/// One normalized representation of a fetched message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub sender: String,
    /// Raw `Date` header text, never parsed
    pub date: String,
    /// Normalized text, truncated for display
    pub content: String,
    pub urls: BTreeSet<String>,
    pub annotation: Option<Annotation>,
}

impl EmailRecord {
    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    pub fn sentiment(&self) -> Option<Sentiment> {
        self.annotation.as_ref().map(|a| a.sentiment)
    }

    pub fn action_items(&self) -> &[String] {
        self.annotation
            .as_ref()
            .map(|a| a.action_items.as_slice())
            .unwrap_or(&[])
    }
}

/// Positional date range of a digest (last record, first record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Aggregated statistics over a batch of records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub total_emails: usize,
    /// Sum of per-record URL counts
    pub total_urls: usize,
    pub unique_urls: BTreeSet<String>,
    pub sentiment_distribution: BTreeMap<Sentiment, usize>,
    pub action_items: Vec<String>,
    pub top_senders: Vec<(String, usize)>,
    pub url_domains: Vec<(String, usize)>,
    /// Records per date-header prefix, sorted by prefix
    pub email_volume: Vec<(String, usize)>,
    pub date_range: Option<DateRange>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.total_emails == 0
    }
}

//! Common test utilities and fixtures

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use gmail_digest::annotator::Annotator;
use gmail_digest::client::MailboxClient;
use gmail_digest::error::Result;
use gmail_digest::models::{
    Annotation, BodyPart, EmailRecord, MessageBody, MessageHeader, RawMessage, Sentiment,
};
use mockall::mock;

/// A `text/plain` part with a base64url payload, as the mailbox delivers it
pub fn plain_part(text: &str) -> BodyPart {
    BodyPart::new("text/plain", URL_SAFE.encode(text))
}

/// A `text/html` part with a base64url payload
pub fn html_part(html: &str) -> BodyPart {
    BodyPart::new("text/html", URL_SAFE.encode(html))
}

/// Create a raw message with the usual headers
pub fn create_raw_message(id: &str, sender: &str, subject: &str, body: MessageBody) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        headers: vec![
            MessageHeader::new("From", sender),
            MessageHeader::new("Subject", subject),
            MessageHeader::new("Date", "Mon, 6 Jan 2025 10:00:00 +0000"),
            MessageHeader::new("To", "me@example.com"),
        ],
        body,
    }
}

/// Create a single-part html message whose body mentions `url`
pub fn create_link_message(id: &str, sender: &str, url: &str) -> RawMessage {
    let html = format!(
        "<html><body><p>New post:  <a href=\"{url}\">{url}</a></p><script>track()</script></body></html>"
    );
    create_raw_message(
        id,
        sender,
        &format!("Update {}", id),
        MessageBody::Single(URL_SAFE.encode(html)),
    )
}

/// Create a record without going through the builder
pub fn create_test_record(id: &str, sender: &str, date: &str, urls: &[&str]) -> EmailRecord {
    EmailRecord {
        id: id.to_string(),
        subject: format!("Subject {}", id),
        sender: sender.to_string(),
        date: date.to_string(),
        content: String::new(),
        urls: urls.iter().map(|u| u.to_string()).collect(),
        annotation: None,
    }
}

/// Annotation a well-behaved model would return
pub fn create_test_annotation(sentiment: Sentiment, action_items: &[&str]) -> Annotation {
    Annotation {
        summary: "A short summary.".to_string(),
        key_points: vec!["First point".to_string()],
        action_items: action_items.iter().map(|a| a.to_string()).collect(),
        sentiment,
    }
}

// Mock implementation of MailboxClient for testing
mock! {
    pub MailboxClient {}

    #[async_trait::async_trait]
    impl MailboxClient for MailboxClient {
        async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, id: &str) -> Result<RawMessage>;
        async fn email_address(&self) -> Result<String>;
    }
}

// Mock implementation of Annotator for testing
mock! {
    pub Annotator {}

    #[async_trait::async_trait]
    impl Annotator for Annotator {
        async fn annotate(&self, content: &str, subject: &str) -> Result<Annotation>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_raw_message() {
        let msg = create_raw_message("msg1", "test@example.com", "Hello", MessageBody::default());
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.header("From"), Some("test@example.com"));
        assert_eq!(msg.header("Subject"), Some("Hello"));
    }

    #[test]
    fn test_parts_are_base64url() {
        let part = html_part("<p>x</p>");
        assert_eq!(part.mime_type, "text/html");
        assert_eq!(URL_SAFE.decode(&part.data).unwrap(), b"<p>x</p>");
    }
}

//! Gmail Digest
//!
//! Fetches Gmail messages, reduces each body to plain text, extracts the
//! hyperlinks it contains, optionally asks a language model for a summary,
//! and folds the batch into a digest.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed-app flow with token caching (read-only scope)
//! - **Content**: base64url decoding, HTML-to-text, whitespace collapsing
//! - **URLs**: textual hyperlink extraction
//! - **Records**: one normalized [`EmailRecord`] per message, with optional annotation
//! - **Digest**: counts, sentiment histogram, sender and domain rankings, date range
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_digest::{auth, client::ProductionGmailClient, config::Config};
//! use gmail_digest::{create_digest, EmailRecordBuilder, EmailScanner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-digest/token.json".as_ref()
//!     ).await?;
//!
//!     let scanner = EmailScanner::new(
//!         Some(Box::new(ProductionGmailClient::new(hub))),
//!         EmailRecordBuilder::from_config(&config.content),
//!     );
//!     let records = scanner.scan("newer_than:7d", config.fetch.max_results).await?;
//!     let digest = create_digest(&records);
//!     println!("{} emails, {} unique URLs", digest.total_emails, digest.unique_urls.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`annotator`] - Annotation service trait and OpenAI implementation
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`cli`] - Command-line interface, reports and orchestration
//! - [`client`] - Mailbox trait and Gmail API client
//! - [`config`] - Configuration management
//! - [`content`] - Body payload normalization
//! - [`digest`] - Digest aggregation, search and URL export
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures
//! - [`record`] - Record building and body selection
//! - [`scanner`] - Sequential fetch loop and query helpers
//! - [`urls`] - Hyperlink extraction

pub mod annotator;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod content;
pub mod digest;
pub mod error;
pub mod models;
pub mod record;
pub mod scanner;
pub mod urls;

pub use error::{GmailError, Result};

// Core data models
pub use models::{
    Annotation, BodyPart, DateRange, Digest, EmailRecord, MessageBody, MessageHeader, RawMessage,
    Sentiment,
};

// Pipeline stages
pub use content::normalize_content;
pub use digest::{create_digest, export_urls, search_records};
pub use record::{BodySelection, EmailRecordBuilder};
pub use urls::extract_urls;

// Collaborator traits
pub use annotator::{parse_annotation_response, Annotator};
pub use client::{MailboxClient, ProductionGmailClient};

#[cfg(feature = "ml")]
pub use annotator::OpenAiAnnotator;

// Scanner types
pub use scanner::{date_range_query, EmailScanner, FetchQuery};

// Config types
pub use config::{AnnotationConfig, Config, ContentConfig, FetchConfig};

// CLI types (for binary usage)
pub use cli::{Cli, Commands, DigestArgs, DigestReport, ProgressReporter};

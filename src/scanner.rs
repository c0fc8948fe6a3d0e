//! Sequential fetch-and-build loop over the mailbox

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::annotator::Annotator;
use crate::client::MailboxClient;
use crate::error::{GmailError, Result};
use crate::models::EmailRecord;
use crate::record::EmailRecordBuilder;

const QUERY_DATE_FORMAT: &str = "%Y/%m/%d";

/// Gmail range expression for the two calendar dates
pub fn date_range_query(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "after:{} before:{}",
        start.format(QUERY_DATE_FORMAT),
        end.format(QUERY_DATE_FORMAT)
    )
}

/// Which messages to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchQuery {
    All,
    DateRange { start: NaiveDate, end: NaiveDate },
    Custom(String),
}

impl FetchQuery {
    /// Range ending at `end` and starting `days` earlier
    pub fn last_days(days: u32, end: NaiveDate) -> Self {
        FetchQuery::DateRange {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }

    pub fn to_query(&self) -> String {
        match self {
            FetchQuery::All => String::new(),
            FetchQuery::DateRange { start, end } => date_range_query(*start, *end),
            FetchQuery::Custom(query) => query.clone(),
        }
    }
}

/// Fetches messages and turns them into records, one at a time
///
/// The mailbox handle is optional so that an unauthenticated scanner can be
/// constructed; every scan checks for it before touching the network.
pub struct EmailScanner {
    mailbox: Option<Box<dyn MailboxClient>>,
    annotator: Option<Box<dyn Annotator>>,
    builder: EmailRecordBuilder,
}

impl EmailScanner {
    pub fn new(mailbox: Option<Box<dyn MailboxClient>>, builder: EmailRecordBuilder) -> Self {
        Self {
            mailbox,
            annotator: None,
            builder,
        }
    }

    pub fn with_annotator(mut self, annotator: Box<dyn Annotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.mailbox.is_some()
    }

    pub fn has_annotator(&self) -> bool {
        self.annotator.is_some()
    }

    /// Fetch up to `max_results` messages matching `query` and build their records
    pub async fn scan(&self, query: &str, max_results: u32) -> Result<Vec<EmailRecord>> {
        self.scan_with_progress(query, max_results, |_, _| {}).await
    }

    /// Like [`scan`](Self::scan), calling `on_progress(done, total)` after each message
    ///
    /// Records come back in listing order. The first mailbox failure aborts
    /// the batch and discards records built so far.
    pub async fn scan_with_progress<F>(
        &self,
        query: &str,
        max_results: u32,
        mut on_progress: F,
    ) -> Result<Vec<EmailRecord>>
    where
        F: FnMut(usize, usize) + Send,
    {
        let mailbox = self.mailbox.as_deref().ok_or(GmailError::NotAuthenticated)?;

        let ids = mailbox.list_message_ids(query, max_results).await?;
        let total = ids.len();
        info!("Found {} messages for query {:?}", total, query);

        let annotator = self.annotator.as_deref();
        let mut records = Vec::with_capacity(total);

        for (index, id) in ids.iter().enumerate() {
            debug!("Fetching message {}/{}: {}", index + 1, total, id);
            let message = mailbox.get_message(id).await?;
            records.push(self.builder.build(&message, annotator).await);
            on_progress(index + 1, total);
        }

        info!("Built {} email records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_query() {
        assert_eq!(
            date_range_query(date(2024, 1, 1), date(2024, 1, 31)),
            "after:2024/01/01 before:2024/01/31"
        );
    }

    #[test]
    fn test_fetch_query_variants() {
        assert_eq!(FetchQuery::All.to_query(), "");
        assert_eq!(
            FetchQuery::Custom("has:attachment".to_string()).to_query(),
            "has:attachment"
        );
        assert_eq!(
            FetchQuery::last_days(7, date(2025, 3, 3)).to_query(),
            "after:2025/02/24 before:2025/03/03"
        );
    }

    #[tokio::test]
    async fn test_scan_without_mailbox_is_not_authenticated() {
        let scanner = EmailScanner::new(None, EmailRecordBuilder::default());
        assert!(!scanner.is_authenticated());

        let err = scanner.scan("", 10).await.unwrap_err();
        assert!(matches!(err, GmailError::NotAuthenticated));
    }
}

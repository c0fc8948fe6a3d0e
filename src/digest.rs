//! Folds a batch of records into a [`Digest`]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::models::{DateRange, Digest, EmailRecord};
use crate::urls::url_domain;

pub const TOP_SENDERS_LIMIT: usize = 5;
pub const TOP_DOMAINS_LIMIT: usize = 10;
const VOLUME_KEY_CHARS: usize = 10;

/// Count occurrences and rank them by descending count
///
/// Ties keep the order in which each key was first seen.
fn rank_by_count<K, I>(items: I, limit: usize) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();

    for item in items {
        match positions.get(&item) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(item.clone(), counts.len());
                counts.push((item, 1));
            }
        }
    }

    // sort_by is stable, so first-seen order survives among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);
    counts
}

/// Aggregate records into summary statistics
///
/// An empty batch yields [`Digest::default`].
pub fn create_digest(records: &[EmailRecord]) -> Digest {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Digest::default();
    };

    let unique_urls: BTreeSet<String> = records
        .iter()
        .flat_map(|r| r.urls.iter().cloned())
        .collect();

    let total_urls = records.iter().map(EmailRecord::url_count).sum();

    let mut sentiment_distribution = BTreeMap::new();
    for sentiment in records.iter().filter_map(EmailRecord::sentiment) {
        *sentiment_distribution.entry(sentiment).or_insert(0) += 1;
    }

    let action_items = records
        .iter()
        .flat_map(|r| r.action_items().iter().cloned())
        .collect();

    let top_senders = rank_by_count(records.iter().map(|r| r.sender.clone()), TOP_SENDERS_LIMIT);

    let mut seen = HashSet::new();
    let domains = records
        .iter()
        .flat_map(|r| r.urls.iter())
        .filter(|url| seen.insert(url.as_str()))
        .filter_map(|url| url_domain(url));
    let url_domains = rank_by_count(domains, TOP_DOMAINS_LIMIT);

    let mut volume: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        let key: String = record.date.chars().take(VOLUME_KEY_CHARS).collect();
        *volume.entry(key).or_insert(0) += 1;
    }

    Digest {
        total_emails: records.len(),
        total_urls,
        unique_urls,
        sentiment_distribution,
        action_items,
        top_senders,
        url_domains,
        email_volume: volume.into_iter().collect(),
        date_range: Some(DateRange {
            start: last.date.clone(),
            end: first.date.clone(),
        }),
    }
}

/// Records whose subject, sender or content contains `term`, ignoring case
///
/// An empty term matches everything.
pub fn search_records<'a>(records: &'a [EmailRecord], term: &str) -> Vec<&'a EmailRecord> {
    let term = term.to_lowercase();
    records
        .iter()
        .filter(|r| {
            term.is_empty()
                || r.subject.to_lowercase().contains(&term)
                || r.sender.to_lowercase().contains(&term)
                || r.content.to_lowercase().contains(&term)
        })
        .collect()
}

/// Plain-text URL export: one URL per line, in `unique_urls` order
pub fn export_urls(digest: &Digest) -> String {
    digest
        .unique_urls
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Annotation, Sentiment};

    fn record(id: &str, sender: &str, date: &str, urls: &[&str]) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            subject: format!("Subject {}", id),
            sender: sender.to_string(),
            date: date.to_string(),
            content: format!("Content of {}", id),
            urls: urls.iter().map(|u| u.to_string()).collect(),
            annotation: None,
        }
    }

    fn annotated(mut r: EmailRecord, sentiment: Sentiment, actions: &[&str]) -> EmailRecord {
        r.annotation = Some(Annotation {
            summary: String::new(),
            key_points: Vec::new(),
            action_items: actions.iter().map(|a| a.to_string()).collect(),
            sentiment,
        });
        r
    }

    #[test]
    fn test_empty_input_yields_default_digest() {
        let digest = create_digest(&[]);
        assert_eq!(digest.total_emails, 0);
        assert!(digest.unique_urls.is_empty());
        assert!(digest.top_senders.is_empty());
        assert!(digest.date_range.is_none());
        assert!(digest.is_empty());
    }

    #[test]
    fn test_top_senders_tie_break_by_first_seen() {
        let senders = ["A", "B", "A", "C", "B", "A"];
        let records: Vec<_> = senders
            .iter()
            .enumerate()
            .map(|(i, s)| record(&i.to_string(), s, "d", &[]))
            .collect();

        let digest = create_digest(&records);
        assert_eq!(
            digest.top_senders,
            vec![
                ("A".to_string(), 3),
                ("B".to_string(), 2),
                ("C".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_top_senders_equal_counts_keep_first_seen_order() {
        let records: Vec<_> = ["Z", "Y", "X", "Y", "Z", "X", "W", "V", "U"]
            .iter()
            .enumerate()
            .map(|(i, s)| record(&i.to_string(), s, "d", &[]))
            .collect();

        let digest = create_digest(&records);
        let names: Vec<_> = digest.top_senders.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, vec!["Z", "Y", "X", "W", "V"]);
    }

    #[test]
    fn test_url_union_and_total() {
        let records = vec![
            record("1", "a", "d1", &["https://a.com/x", "https://b.com"]),
            record("2", "b", "d2", &["https://a.com/x", "http://c.org/p"]),
        ];

        let digest = create_digest(&records);
        assert_eq!(digest.total_urls, 4);
        assert_eq!(digest.unique_urls.len(), 3);
        assert!(digest.unique_urls.contains("http://c.org/p"));
    }

    #[test]
    fn test_url_domains_count_unique_urls() {
        let records = vec![
            record("1", "a", "d", &["https://a.com/1", "https://b.com/1"]),
            record("2", "a", "d", &["https://a.com/1", "https://a.com/2", "https://b.com/2"]),
            record("3", "a", "d", &["https://c.com/"]),
        ];

        let digest = create_digest(&records);
        assert_eq!(
            digest.url_domains,
            vec![
                ("a.com".to_string(), 2),
                ("b.com".to_string(), 2),
                ("c.com".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_url_domains_are_grouped_as_written() {
        let records = vec![
            record("1", "a", "d", &["https://Example.com/a"]),
            record("2", "a", "d", &["https://example.com/b"]),
            record("3", "a", "d", &["https://a.com:443/x"]),
        ];

        let digest = create_digest(&records);
        assert_eq!(
            digest.url_domains,
            vec![
                ("Example.com".to_string(), 1),
                ("example.com".to_string(), 1),
                ("a.com:443".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_sentiment_and_action_items() {
        let records = vec![
            annotated(record("1", "a", "d", &[]), Sentiment::Positive, &["reply", "file"]),
            record("2", "a", "d", &[]),
            annotated(record("3", "a", "d", &[]), Sentiment::Positive, &["reply"]),
            annotated(record("4", "a", "d", &[]), Sentiment::Negative, &[]),
        ];

        let digest = create_digest(&records);
        assert_eq!(digest.sentiment_distribution.get(&Sentiment::Positive), Some(&2));
        assert_eq!(digest.sentiment_distribution.get(&Sentiment::Negative), Some(&1));
        assert_eq!(digest.sentiment_distribution.get(&Sentiment::Neutral), None);
        assert_eq!(digest.action_items, vec!["reply", "file", "reply"]);
    }

    #[test]
    fn test_date_range_is_positional() {
        let records = vec![
            record("1", "a", "Tue, 7 Jan 2025", &[]),
            record("2", "a", "Mon, 6 Jan 2025", &[]),
            record("3", "a", "Sun, 5 Jan 2025", &[]),
        ];

        let range = create_digest(&records).date_range.unwrap();
        assert_eq!(range.start, "Sun, 5 Jan 2025");
        assert_eq!(range.end, "Tue, 7 Jan 2025");
    }

    #[test]
    fn test_email_volume_groups_by_date_prefix() {
        let records = vec![
            record("1", "a", "2025-01-07T10:00", &[]),
            record("2", "a", "2025-01-06T09:00", &[]),
            record("3", "a", "2025-01-07T08:00", &[]),
            record("4", "a", "short", &[]),
        ];

        let digest = create_digest(&records);
        assert_eq!(
            digest.email_volume,
            vec![
                ("2025-01-06".to_string(), 1),
                ("2025-01-07".to_string(), 2),
                ("short".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_search_records_case_insensitive() {
        let mut r1 = record("1", "Alice <alice@example.com>", "d", &[]);
        r1.subject = "Quarterly REPORT".to_string();
        let r2 = record("2", "bob@example.com", "d", &[]);
        let records = vec![r1, r2];

        assert_eq!(search_records(&records, "report").len(), 1);
        assert_eq!(search_records(&records, "ALICE").len(), 1);
        assert_eq!(search_records(&records, "content of 2")[0].id, "2");
        assert_eq!(search_records(&records, "").len(), 2);
        assert!(search_records(&records, "nothing").is_empty());
    }

    #[test]
    fn test_export_urls() {
        let records = vec![record("1", "a", "d", &["https://b.com", "https://a.com"])];
        let digest = create_digest(&records);
        assert_eq!(export_urls(&digest), "https://a.com\nhttps://b.com");
        assert_eq!(export_urls(&Digest::default()), "");
    }
}

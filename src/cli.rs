//! Command-line interface and digest orchestration

use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::annotator::Annotator;
use crate::auth;
use crate::client::{MailboxClient, ProductionGmailClient};
use crate::config::Config;
use crate::digest::{create_digest, export_urls, search_records};
use crate::error::{GmailError, Result};
use crate::models::{Digest, EmailRecord};
use crate::record::EmailRecordBuilder;
use crate::scanner::{EmailScanner, FetchQuery};

#[derive(Parser, Debug)]
#[command(name = "gmail-digest")]
#[command(version)]
#[command(about = "Fetch Gmail messages, extract links and build a digest", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-digest/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Verify the credentials file and that the Gmail API is enabled
    Check,

    /// Fetch messages and print a digest
    Digest(DigestArgs),

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct DigestArgs {
    /// Gmail search query (e.g. 'from:example@gmail.com', 'has:attachment')
    #[arg(short, long, conflicts_with_all = ["after", "before"])]
    pub query: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub after: Option<NaiveDate>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub before: Option<NaiveDate>,

    /// Fetch the last `fetch.range_days` days (ending today)
    #[arg(long, conflicts_with_all = ["query", "after", "before"])]
    pub recent: bool,

    /// Maximum number of messages to fetch
    #[arg(short = 'n', long)]
    pub max_results: Option<u32>,

    /// Annotate each message with a summary, action items and sentiment
    #[arg(long)]
    pub summarize: bool,

    /// Only list messages whose subject, sender or content contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Write a Markdown report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the unique URLs, one per line, to this path
    #[arg(long, num_args = 0..=1, default_missing_value = "extracted_urls.txt")]
    pub export_urls: Option<PathBuf>,
}

impl DigestArgs {
    /// Resolve the fetch selection
    ///
    /// An explicit query wins. `--recent` covers the `range_days` days up to
    /// `today`, and a single range bound is completed with `range_days` on the
    /// other side. Otherwise the configured default query (or all mail) is used.
    pub fn fetch_query(&self, config: &Config, today: NaiveDate) -> Result<FetchQuery> {
        if let Some(query) = &self.query {
            return Ok(FetchQuery::Custom(query.clone()));
        }

        if self.recent {
            return Ok(FetchQuery::last_days(config.fetch.range_days, today));
        }

        let span = chrono::Duration::days(i64::from(config.fetch.range_days));
        let range = match (self.after, self.before) {
            (None, None) => None,
            (Some(start), Some(end)) => Some((start, end)),
            (Some(start), None) => Some((start, start + span)),
            (None, Some(end)) => Some((end - span, end)),
        };

        match range {
            Some((start, end)) if start > end => Err(GmailError::ConfigError(format!(
                "Start date {} is after end date {}",
                start, end
            ))),
            Some((start, end)) => Ok(FetchQuery::DateRange { start, end }),
            None if config.fetch.default_query.is_empty() => Ok(FetchQuery::All),
            None => Ok(FetchQuery::Custom(config.fetch.default_query.clone())),
        }
    }

    pub fn max_results(&self, config: &Config) -> Result<u32> {
        let max = self.max_results.unwrap_or(config.fetch.max_results);
        if max == 0 || max > 500 {
            return Err(GmailError::ConfigError(format!(
                "--max-results must be between 1 and 500, got {}",
                max
            )));
        }
        Ok(max)
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share a `MultiProgress` with the log writer so log lines print above the bars
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one digest run
#[derive(Debug, Clone)]
pub struct DigestReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub query: String,
    /// Search filter applied to the listed records, if any
    pub search: Option<String>,
    pub summarized: bool,
    pub digest: Digest,
    /// Records shown in the report (after the search filter)
    pub records: Vec<EmailRecord>,
}

impl DigestReport {
    pub fn new(
        query: String,
        search: Option<String>,
        summarized: bool,
        records: Vec<EmailRecord>,
    ) -> Self {
        let digest = create_digest(&records);
        let records = match search.as_deref() {
            Some(term) => search_records(&records, term).into_iter().cloned().collect(),
            None => records,
        };

        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            query,
            search,
            summarized,
            digest,
            records,
        }
    }

    /// Generate Markdown report
    pub fn to_markdown(&self) -> String {
        let digest = &self.digest;
        let mut md = String::new();

        md.push_str("# Email Digest\n\n");
        md.push_str(&format!(
            "Generated: {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Run ID:** {}\n", self.run_id));
        let query = if self.query.is_empty() { "(all mail)" } else { &self.query };
        md.push_str(&format!("- **Query:** `{}`\n", query));
        md.push_str(&format!("- **Total emails:** {}\n", digest.total_emails));
        md.push_str(&format!("- **Unique URLs:** {}\n", digest.unique_urls.len()));
        md.push_str(&format!("- **Total URLs:** {}\n", digest.total_urls));
        if self.summarized {
            md.push_str(&format!("- **Action items:** {}\n", digest.action_items.len()));
        }
        if let Some(range) = &digest.date_range {
            md.push_str(&format!("- **Date range:** {} to {}\n", range.start, range.end));
        }
        md.push('\n');

        if digest.is_empty() {
            md.push_str("_No emails matched._\n");
            return md;
        }

        if !digest.sentiment_distribution.is_empty() {
            md.push_str("## Sentiment Distribution\n\n");
            md.push_str("| Sentiment | Count |\n");
            md.push_str("|-----------|-------|\n");
            for (sentiment, count) in &digest.sentiment_distribution {
                md.push_str(&format!("| {} | {} |\n", sentiment, count));
            }
            md.push('\n');
        }

        md.push_str("## Top Senders\n\n");
        for (i, (sender, count)) in digest.top_senders.iter().enumerate() {
            md.push_str(&format!("{}. **{}** ({} emails)\n", i + 1, sender, count));
        }
        md.push('\n');

        if !digest.url_domains.is_empty() {
            md.push_str("## Top URL Domains\n\n");
            md.push_str("| Domain | URLs |\n");
            md.push_str("|--------|------|\n");
            for (domain, count) in &digest.url_domains {
                md.push_str(&format!("| {} | {} |\n", domain, count));
            }
            md.push('\n');
        }

        md.push_str("## Email Volume\n\n");
        md.push_str("| Date | Emails |\n");
        md.push_str("|------|--------|\n");
        for (date, count) in &digest.email_volume {
            md.push_str(&format!("| {} | {} |\n", date.replace('|', "\\|"), count));
        }
        md.push('\n');

        if !digest.action_items.is_empty() {
            md.push_str("## Action Items\n\n");
            for (i, item) in digest.action_items.iter().enumerate() {
                md.push_str(&format!("{}. {}\n", i + 1, item));
            }
            md.push('\n');
        }

        match &self.search {
            Some(term) => md.push_str(&format!(
                "## Emails matching \"{}\" ({})\n\n",
                term,
                self.records.len()
            )),
            None => md.push_str("## Emails\n\n"),
        }
        for (i, record) in self.records.iter().enumerate() {
            md.push_str(&format!("### {}. {}\n\n", i + 1, record.subject));
            md.push_str(&format!("- **From:** {}\n", record.sender));
            md.push_str(&format!("- **Date:** {}\n", record.date));
            md.push_str(&format!("- **URLs:** {}\n", record.url_count()));
            if let Some(annotation) = &record.annotation {
                md.push_str(&format!("- **Sentiment:** {}\n", annotation.sentiment));
                md.push_str(&format!("\n**Summary:** {}\n", annotation.summary));
                if !annotation.key_points.is_empty() {
                    md.push_str("\n**Key points:**\n");
                    for point in &annotation.key_points {
                        md.push_str(&format!("- {}\n", point));
                    }
                }
                if !annotation.action_items.is_empty() {
                    md.push_str("\n**Action items:**\n");
                    for item in &annotation.action_items {
                        md.push_str(&format!("- {}\n", item));
                    }
                }
            }
            if !record.content.is_empty() {
                md.push_str(&format!("\n> {}\n", record.content));
            }
            md.push('\n');
        }

        if !digest.unique_urls.is_empty() {
            md.push_str("## Extracted URLs\n\n");
            for url in &digest.unique_urls {
                md.push_str(&format!("- <{}>\n", url));
            }
            md.push('\n');
        }

        md
    }

    /// Plain-text lines for the terminal
    pub fn summary_lines(&self) -> Vec<String> {
        let digest = &self.digest;
        let mut lines = vec![
            "========================================".to_string(),
            "Email Digest".to_string(),
            "========================================".to_string(),
            format!("Total emails: {}", digest.total_emails),
            format!("Unique URLs: {}", digest.unique_urls.len()),
        ];
        if self.summarized {
            lines.push(format!("Action items: {}", digest.action_items.len()));
            let sentiments: Vec<String> = digest
                .sentiment_distribution
                .iter()
                .map(|(s, c)| format!("{} {}", s, c))
                .collect();
            lines.push(format!("Sentiment: {}", sentiments.join(", ")));
        }
        if let Some(range) = &digest.date_range {
            lines.push(format!("Date range: {} to {}", range.start, range.end));
        }
        if !digest.top_senders.is_empty() {
            lines.push("Top senders:".to_string());
            for (sender, count) in &digest.top_senders {
                lines.push(format!("  {:>4}  {}", count, truncate_string(sender, 60)));
            }
        }
        if let Some(term) = &self.search {
            lines.push(format!("Matching \"{}\": {}", term, self.records.len()));
            for record in &self.records {
                lines.push(format!(
                    "  - {} | {}",
                    truncate_string(&record.subject, 50),
                    truncate_string(&record.sender, 40)
                ));
            }
        }
        lines.push("========================================".to_string());
        lines
    }

    /// Save report to file
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_markdown()).await
    }

    /// Write the URL export to `path`
    pub async fn save_urls(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, export_urls(&self.digest)).await
    }
}

/// Build the annotator when summarization is requested on the command line or in config
pub fn build_annotator(config: &Config, requested: bool) -> Result<Option<Box<dyn Annotator>>> {
    if !(requested || config.annotation.enabled) {
        return Ok(None);
    }

    #[cfg(feature = "ml")]
    {
        let annotator = crate::annotator::OpenAiAnnotator::from_env(&config.annotation)?;
        Ok(Some(Box::new(annotator)))
    }

    #[cfg(not(feature = "ml"))]
    {
        Err(GmailError::ConfigError(
            "Summarization needs the 'ml' feature; rebuild with --features ml".to_string(),
        ))
    }
}

/// Authenticate and wrap the hub in a mailbox client
pub async fn connect(cli: &Cli) -> Result<ProductionGmailClient> {
    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
    if cli.token_cache.exists() {
        auth::secure_token_file(&cli.token_cache).await?;
    }
    Ok(ProductionGmailClient::new(hub))
}

/// Verify the setup: credentials file shape, authentication, and a one-message listing
///
/// Returns the connected account address.
pub async fn run_check(cli: &Cli, reporter: &ProgressReporter) -> Result<String> {
    let spinner = reporter.add_spinner("Checking credentials file...");
    auth::validate_credentials(&cli.credentials).await?;
    reporter.finish_spinner(&spinner, &format!("Credentials file {:?} is valid", cli.credentials));

    let spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let client = connect(cli).await?;
    reporter.finish_spinner(&spinner, "Authenticated");

    let spinner = reporter.add_spinner("Listing one message...");
    client.list_message_ids("", 1).await?;
    let address = client.email_address().await?;
    reporter.finish_spinner(&spinner, "Gmail API is enabled and answering");

    Ok(address)
}

/// Fetch, build records, aggregate, and optionally write the report and URL export
pub async fn run_digest(
    cli: &Cli,
    args: &DigestArgs,
    reporter: &ProgressReporter,
) -> Result<DigestReport> {
    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = Config::load(&cli.config).await?;
    reporter.finish_spinner(&config_spinner, &format!("Configuration loaded from {:?}", cli.config));

    let fetch_query = args.fetch_query(&config, Local::now().date_naive())?;
    let max_results = args.max_results(&config)?;
    let annotator = build_annotator(&config, args.summarize)?;

    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let client = connect(cli).await?;
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated successfully");

    let mut scanner = EmailScanner::new(
        Some(Box::new(client)),
        EmailRecordBuilder::from_config(&config.content),
    );
    let summarized = annotator.is_some();
    if let Some(annotator) = annotator {
        scanner = scanner.with_annotator(annotator);
    }

    let query = fetch_query.to_query();
    info!("Fetching up to {} messages with query {:?}", max_results, query);

    let bar = reporter.add_progress_bar(u64::from(max_results), "Fetching messages...");
    let records = scanner
        .scan_with_progress(&query, max_results, |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        })
        .await;
    let records = match records {
        Ok(records) => {
            bar.finish_with_message(format!("Fetched {} messages", records.len()));
            records
        }
        Err(e) => {
            bar.abandon_with_message("Fetch failed");
            return Err(e);
        }
    };

    let report = DigestReport::new(query, args.search.clone(), summarized, records);

    if let Some(path) = &args.report {
        report.save(path).await?;
        info!("Report written to {:?}", path);
    }
    if let Some(path) = &args.export_urls {
        report.save_urls(path).await?;
        info!("{} URLs written to {:?}", report.digest.unique_urls.len(), path);
    }

    Ok(report)
}

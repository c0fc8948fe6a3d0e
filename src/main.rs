use anyhow::Result;
use clap::Parser;
use gmail_digest::auth;
use gmail_digest::cli::{self, Cli, Commands, ProgressReporter};
use gmail_digest::client::MailboxClient;
use gmail_digest::config::Config;
use gmail_digest::error::GmailError;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Routes log lines through `MultiProgress::println` so they print above the bars
#[derive(Clone)]
struct ProgressLogWriter(MultiProgress);

/// One formatted event, printed when tracing drops the writer
struct LogLine {
    multi: MultiProgress,
    buf: Vec<u8>,
}

impl Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end_matches('\n');
        if !line.is_empty() {
            let _ = self.multi.println(line);
        }
    }
}

impl<'a> MakeWriter<'a> for ProgressLogWriter {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            multi: self.0.clone(),
            buf: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: gmail-digest --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick one crypto provider explicitly
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_digest=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_digest=info,warn"))
    };

    // Logs print above progress bars through the shared MultiProgress
    let multi_progress = MultiProgress::new();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ProgressLogWriter(multi_progress.clone()))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    let reporter = ProgressReporter::with_multi_progress(multi_progress);

    match &cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if *force {
                auth::clear_token_cache(&cli.token_cache).await?;
            }

            if !cli.credentials.exists() {
                // Fall back to GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET
                auth::write_credentials_from_env(&cli.credentials).await?;
                tracing::info!("Wrote {:?} from environment", cli.credentials);
            }

            let client = cli::connect(&cli).await?;
            let address = client.email_address().await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);
            println!("Connected to account: {}", address);

            Ok(())
        }

        Commands::Check => {
            let address = cli::run_check(&cli, &reporter).await?;
            println!("Setup complete. Connected to account: {}", address);
            Ok(())
        }

        Commands::Digest(args) => {
            tracing::info!("Starting digest run");
            let report = cli::run_digest(&cli, args, &reporter).await?;

            for line in report.summary_lines() {
                println!("{}", line);
            }
            if let Some(path) = &args.report {
                println!("Report saved to: {:?}", path);
            }
            if let Some(path) = &args.export_urls {
                println!("URLs saved to: {:?}", path);
            }

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(GmailError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - fetch.max_results: How many messages a digest fetches");
            println!("  - content.body_selection: 'last-html' or 'first-html'");
            println!("  - annotation.enabled: Summarize every message with OpenAI");

            Ok(())
        }
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    let Some(gmail_err) = error.downcast_ref::<GmailError>() else {
        return;
    };

    if gmail_err.is_api_not_enabled() {
        eprintln!("\nHint: The Gmail API is not enabled for this Google Cloud project.");
        eprintln!("      Enable it at https://console.cloud.google.com/apis/library/gmail.googleapis.com");
        eprintln!("      then wait a few minutes and run: gmail-digest check");
        return;
    }

    match gmail_err {
        GmailError::AuthError(_) | GmailError::NotAuthenticated => {
            eprintln!("\nHint: Make sure your credentials.json file is valid.");
            eprintln!("      You can download it from Google Cloud Console.");
            eprintln!("      Try running: gmail-digest auth --force");
        }
        GmailError::RateLimitExceeded { retry_after } => {
            eprintln!("\nHint: You've hit Gmail API rate limits.");
            eprintln!("      Wait {} seconds and run the digest again.", retry_after);
            eprintln!("      Consider lowering --max-results.");
        }
        GmailError::ConfigError(_) => {
            eprintln!("\nHint: Check your configuration file for errors.");
            eprintln!("      Run: gmail-digest init-config --force");
        }
        e if e.is_transient() => {
            eprintln!("\nHint: This may be a temporary API error.");
            eprintln!("      Try running the command again.");
        }
        _ => {}
    }
}

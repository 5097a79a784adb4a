//! CLI entry point for `inbox-harvest`.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use inbox_harvest::config::{Config, Credentials};
use inbox_harvest::harvest::{fetch_recent_messages_with, HarvestOptions};
use inbox_harvest::FetchedMessage;

/// How much of each body the summary view prints.
const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(
    name = "inbox-harvest",
    version,
    about = "Fetch recent mail over IMAP and save the attachments",
    after_help = "Credentials are read from EMAIL_LOGIN, EMAIL_PASSWORD, EMAIL_IMAP_HOST and \
                  EMAIL_IMAP_PORT (a .env file is honored)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch messages from the last N days and extract their attachments
    Fetch {
        /// Days back to search (default from config, else 2)
        #[arg(short, long)]
        days: Option<u32>,
        /// Directory for attachments (default from config, else ./attachments)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Mailbox to read (default INBOX)
        #[arg(long)]
        mailbox: Option<String>,
        /// Print the decoded messages as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may already be exported.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = inbox_harvest::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch {
            days,
            output,
            mailbox,
            json,
        } => {
            let mut options = HarvestOptions::from_config(&config);
            if let Some(days) = days {
                options.days = days;
            }
            if let Some(output) = output {
                options.output_dir = output;
            }
            if let Some(mailbox) = mailbox {
                options.mailbox = mailbox;
            }
            cmd_fetch(&options, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = inbox_harvest::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "inbox-harvest.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "inbox-harvest", &mut std::io::stdout());
    Ok(())
}

/// Fetch, decode and report.
fn cmd_fetch(options: &HarvestOptions, json: bool) -> anyhow::Result<()> {
    let credentials = Credentials::from_env()?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Fetching [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let result = fetch_recent_messages_with(&credentials, options, &|done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    });
    pb.finish_and_clear();
    let messages = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        print_summary(&messages, options);
    }
    Ok(())
}

fn print_summary(messages: &[FetchedMessage], options: &HarvestOptions) {
    println!(
        "  Found {} message(s) from the last {} day(s)",
        messages.len(),
        options.days
    );

    for message in messages {
        println!();
        println!("  Subject:     {}", message.subject);
        println!("  Date:        {}", message.date);
        if message.attachments.is_empty() {
            println!("  Attachments: none");
        } else {
            println!("  Attachments:");
            for path in &message.attachments {
                println!("    {}", path.display());
            }
        }
        let preview: String = message.body.chars().take(BODY_PREVIEW_CHARS).collect();
        println!("  Body:\n{preview}");
    }
}

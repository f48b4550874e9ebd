//! Command-line interface definitions for the cloud update digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Mail settings can be provided via command-line flags, environment
//! variables or a `.env` file.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for the weekly digest run.
///
/// # Examples
///
/// ```sh
/// # Collect and mail this week's digest (SMTP settings from the environment)
/// cloud_update_digest -j ./output
///
/// # Re-run a past week without sending mail
/// cloud_update_digest --today 2024-06-07 --dry-run
///
/// # With a config file overriding timeouts and text rules
/// cloud_update_digest -c ./digest.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON snapshot
    #[arg(short, long, default_value = "output")]
    pub json_output_dir: String,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Reference date (YYYY-MM-DD) for the weekly window; defaults to today
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Collect and write JSON, but do not send mail
    #[arg(long)]
    pub dry_run: bool,

    /// SMTP relay host
    #[arg(long, env = "SMTP_SERVER")]
    pub smtp_server: Option<String>,

    /// SMTP port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    /// Sender address, also the SMTP login
    #[arg(long, env = "SENDER")]
    pub sender: Option<String>,

    /// SMTP password for the sender
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// Comma-separated receiver addresses
    #[arg(long, env = "RECEIVERS", value_delimiter = ',')]
    pub receivers: Vec<String>,
}

//! # Cloud Update Digest
//!
//! A weekly pipeline that collects product-update announcements from Azure,
//! AWS and GCP, summarizes and translates them, and mails an HTML digest.
//!
//! ## Features
//!
//! - Azure updates listing driven through a headless browser, with early
//!   stop once entries fall before the week
//! - AWS "What's New" RSS feed
//! - GCP release-notes Atom feed, split into one item per service block
//! - Extractive summaries (TextRank) translated to Korean
//! - JSON snapshot per run and an HTML mail digest sent over SMTP
//!
//! ## Usage
//!
//! ```sh
//! cloud_update_digest -j ./output
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Window**: Compute the Monday to Sunday week around the run date
//! 2. **Collection**: Run each provider collector in turn (Azure, GCP, AWS)
//! 3. **Normalization**: Summarize then translate every admitted entry
//! 4. **Output**: Write the JSON snapshot, then render and mail the digest

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dates;
mod delivery;
mod models;
mod normalize;
mod outputs;
mod scrapers;
mod text;
mod utils;
mod window;

use cli::Cli;
use config::DigestConfig;
use delivery::{DeliveryError, DeliveryOutcome, DeliveryRetrier, SmtpSettings, SmtpTransport};
use models::{Aggregator, Provider};
use normalize::translate::{GoogleTranslator, Translate};
use normalize::Normalizer;
use outputs::{html, json};
use scrapers::browser::HeadlessBrowser;
use scrapers::feed::HttpFeedSource;
use utils::ensure_writable_dir;
use window::DateWindow;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env first so RUST_LOG and the SMTP variables can come from it
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("cloud_update_digest starting up");
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env loaded"),
    }

    let args = Cli::parse();
    debug!(?args.json_output_dir, ?args.config, dry_run = args.dry_run, "Parsed CLI arguments");

    let config = DigestConfig::load(args.config.as_deref())?;

    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let window = DateWindow::compute(today);
    info!(%today, %window, "Reporting window");

    // Early check; a failed snapshot never blocks delivery
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        warn!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable; the snapshot will be skipped"
        );
    }

    let translator = GoogleTranslator::new(
        &config.translation.endpoint,
        &config.translation.source,
        &config.translation.target,
        Duration::from_millis(config.translation.timeout_ms),
    )?;
    let normalizer = Normalizer::new(translator);

    // ---- Collect, one source at a time ----
    let mut aggregator = Aggregator::new();
    aggregator.extend(collect_azure(&config, &window, &normalizer).await);

    let gcp_source = HttpFeedSource::new(Duration::from_millis(config.gcp.fetch_timeout_ms))?;
    aggregator.extend(
        scrapers::gcp::collect(
            &gcp_source,
            &config.gcp.feed_url,
            &config.gcp.release_notes_url,
            &window,
            &config.gcp.segmenter()?,
            &normalizer,
        )
        .await,
    );

    let aws_source = HttpFeedSource::new(Duration::from_millis(config.aws.fetch_timeout_ms))?;
    aggregator.extend(
        scrapers::aws::collect(
            &aws_source,
            &config.aws.feed_url,
            &window,
            &config.aws.segmenter()?,
            &normalizer,
        )
        .await,
    );

    for provider in Provider::ALL {
        info!(%provider, count = aggregator.count_for(provider), "Collected updates");
    }

    // ---- Outputs ----
    match json::write_digest(&aggregator, &args.json_output_dir, today).await {
        Ok(path) => info!(path = %path.display(), "Saved update snapshot"),
        Err(e) => error!(error = %e, "Failed to save update snapshot; continuing to delivery"),
    }

    let outcome = if args.dry_run {
        info!("Dry run; delivery disabled");
        None
    } else {
        Some(deliver(&args, &config, &aggregator, &window, today).await)
    };

    let counts = aggregator.count_by_source();
    let count = |p: Provider| counts.get(&p).copied().unwrap_or(0);
    let outcome = outcome.map_or_else(|| "dry run".to_string(), |o| o.to_string());
    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        total = aggregator.len(),
        azure = count(Provider::Azure),
        aws = count(Provider::Aws),
        gcp = count(Provider::Gcp),
        %outcome,
        "Run finished"
    );

    Ok(())
}

/// Run the Azure collector; a browser that fails to start yields no items.
async fn collect_azure<T: Translate>(
    config: &DigestConfig,
    window: &DateWindow,
    normalizer: &Normalizer<T>,
) -> Vec<models::UpdateItem> {
    let headless = config.azure.headless;
    match tokio::task::block_in_place(|| HeadlessBrowser::launch(headless)) {
        Ok(browser) => {
            scrapers::azure::collect(browser, &config.azure.listing_options(), window, normalizer)
                .await
        }
        Err(e) => {
            error!(error = %e, "Browser unavailable; skipping Azure");
            Vec::new()
        }
    }
}

fn smtp_settings(args: &Cli) -> Result<SmtpSettings, DeliveryError> {
    let required = |value: &Option<String>, name: &'static str| {
        value
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or(DeliveryError::MissingSetting(name))
    };
    Ok(SmtpSettings {
        server: required(&args.smtp_server, "SMTP_SERVER")?,
        port: args.smtp_port,
        sender: required(&args.sender, "SENDER")?,
        password: required(&args.email_password, "EMAIL_PASSWORD")?,
        receivers: args.receivers.clone(),
    })
}

/// Render the digest and send it with retries.
#[instrument(level = "info", skip_all)]
async fn deliver(
    args: &Cli,
    config: &DigestConfig,
    aggregator: &Aggregator,
    window: &DateWindow,
    today: NaiveDate,
) -> DeliveryOutcome {
    if aggregator.is_empty() {
        info!("No updates this week; nothing to send");
        return DeliveryOutcome::Skipped;
    }
    let transport = match smtp_settings(args).and_then(|s| SmtpTransport::new(&s)) {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, "Mail transport could not be configured");
            return DeliveryOutcome::Exhausted {
                attempts: 0,
                last_error: e,
            };
        }
    };
    let retrier = DeliveryRetrier::new(
        transport,
        config.delivery.attempts,
        Duration::from_millis(config.delivery.backoff_ms),
    );
    debug!(?retrier, "Delivering digest");

    let artifact = html::render_digest(aggregator, window, today);
    retrier.send(aggregator, &artifact).await
}

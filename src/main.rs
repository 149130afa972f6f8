//! EPUB Inliner
//!
//! Reads an EPUB, inlines its images and stylesheets, and writes the
//! resulting file set to an output directory.
//!
//! Usage: `epub-inliner <book.epub> [output-dir]`

use anyhow::Context;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epub_inliner::{log_progress, output::write_book, Config, EpubProcessor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epub_inliner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let mut args = std::env::args().skip(1);
    let input = PathBuf::from(
        args.next()
            .context("usage: epub-inliner <book.epub> [output-dir]")?,
    );
    if let Some(dir) = args.next() {
        config.output_dir = PathBuf::from(dir);
    }

    tracing::info!("Processing {}", input.display());

    let data = tokio::fs::read(&input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let processor = EpubProcessor::new(config.clone());
    let book = processor
        .process_async(data, log_progress)
        .await
        .with_context(|| format!("failed to process {}", input.display()))?;

    if let Some(title) = book.package.metadata_text("dc:title") {
        tracing::info!("Title: {}", title);
    }

    let written = write_book(&book, &config.output_dir)
        .with_context(|| format!("failed to write {}", config.output_dir.display()))?;

    tracing::info!(
        "Done: {} files, {} references embedded, {} missing",
        written,
        book.report.references_embedded,
        book.report.references_missing
    );

    Ok(())
}

//! ginhawa_redesign - One-shot street redesign
//!
//! Reads a photo, runs it through the redesign pipeline and writes the
//! generated JPEG.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use ginhawa::session::Session;
use ginhawa::{gemini_generator, ingest, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ginhawa one-shot redesign tool
#[derive(Parser, Debug)]
#[command(
    name = "ginhawa_redesign",
    version,
    about = "Redesign a street photo into a pedestrian-first concept"
)]
struct Args {
    /// Street photo to redesign
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the generated JPEG
    #[arg(short, long)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ginhawa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let session = Session::shared();
    match ingest::read_as_data_uri(&args.input).await {
        Ok(uri) => {
            if let Err(err) = session.upload(&uri) {
                bail!("{}", err);
            }
        }
        Err(e) => {
            let err = session.reject_upload(&e);
            bail!("{} ({})", err, e);
        }
    }

    // Print progress as the session moves through its phases
    let mut updates = session.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let phase = updates.borrow_and_update().phase();
            if let Some(message) = phase.loading_message() {
                println!("{}", message);
            }
        }
    });

    let generator = gemini_generator(&config, session.clone())?;
    let report = generator.generate().await?;
    progress.abort();

    let image = match report.result {
        Ok(image) => image,
        Err(err) => bail!("{} [{}]", err, err.kind.as_str()),
    };

    tokio::fs::write(&args.output, &image.bytes).await?;
    info!(
        "Wrote {} ({} bytes) for run {}",
        args.output.display(),
        image.len(),
        report.run_id
    );
    println!("{}", args.output.display());

    Ok(())
}

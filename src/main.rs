use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use vtry::presentation::{default_result_path, render, render_result, save_result};
use vtry::{
    intake, Config, EncodedImage, GeminiClient, GenerationStatus, IntakeSource, SourceFile,
    TryOnSession,
};

/// Dress the person in one photo with the clothing from another, using Gemini
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Clothing image, as picked from a file chooser
    #[arg(long, conflicts_with = "drop_cloth")]
    cloth: Option<PathBuf>,

    /// Person image, as picked from a file chooser
    #[arg(long, conflicts_with = "drop_person")]
    person: Option<PathBuf>,

    /// Clothing image, as dropped (ignored unless it is an image type)
    #[arg(long)]
    drop_cloth: Option<PathBuf>,

    /// Person image, as dropped (ignored unless it is an image type)
    #[arg(long)]
    drop_person: Option<PathBuf>,

    /// Where to save the result (defaults to aiedit-pro-result.png in the output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Gemini model name
    #[arg(short, long)]
    model: Option<String>,

    /// Path to a config file (defaults to ~/.vtry/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Picker wins over drop when both could apply to a slot
fn slot_input(
    picked: Option<PathBuf>,
    dropped: Option<PathBuf>,
) -> (IntakeSource, Option<SourceFile>) {
    match (picked, dropped) {
        (Some(path), _) => (IntakeSource::Picker, Some(SourceFile::from_path(path))),
        (None, Some(path)) => (IntakeSource::Drop, Some(SourceFile::from_path(path))),
        (None, None) => (IntakeSource::Picker, None),
    }
}

async fn load_slot(
    label: &str,
    picked: Option<PathBuf>,
    dropped: Option<PathBuf>,
) -> Option<EncodedImage> {
    let (source, file) = slot_input(picked, dropped);
    match intake(source, file).await {
        Ok(image) => image,
        Err(e) => {
            warn!("Could not load {} image: {}", label, e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load_required(path)?,
        None => Config::load_or_default(),
    };
    if let Some(model) = args.model.clone() {
        config.model = model;
    }

    info!("V-Try starting...");
    info!("Model: {}", config.model);

    let mut session = TryOnSession::new();
    session.set_cloth_image(load_slot("clothing", args.cloth, args.drop_cloth).await);
    session.set_person_image(load_slot("person", args.person, args.drop_person).await);

    println!("{}", render(&session));

    if !session.can_generate() {
        bail!("Both a clothing image and a person image are required");
    }

    let client = GeminiClient::new(&config.gemini())
        .context("Set GEMINI_API_KEY (or API_KEY) to your Gemini API key")?;

    println!("{}", render_result(&GenerationStatus::Loading));
    session.generate(&client).await;
    println!("{}", render_result(session.generation_status()));

    match session.generation_status() {
        GenerationStatus::Success { image } => {
            let path = args
                .output
                .unwrap_or_else(|| default_result_path(&config.output_dir()));
            let saved = save_result(image, &path).await?;
            println!("Saved to {}", saved.display());
            info!("Session complete");
            Ok(())
        }
        GenerationStatus::Error { message } => {
            error!("Generation failed: {}", message);
            bail!("Generation failed: {}", message)
        }
        other => bail!("Generation ended in unexpected state {:?}", other),
    }
}

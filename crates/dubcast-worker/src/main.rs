//! Dubbing worker binary.
//!
//! Runs one dubbing request read from a JSON file:
//!
//! ```text
//! dubcast-worker request.json
//! ```
//!
//! The source upload is transcribed, a target row is bootstrapped and the
//! translation job runs against it. The finished row is printed as JSON.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dubcast_media::{FfmpegEngine, FfmpegRunner};
use dubcast_models::{JobIdentifier, VoiceSelector};
use dubcast_providers::{
    ElevenLabsSynthesizer, LipSyncer, OpenAiTranslator, ReplicateLipSync, ReplicateTranscriber,
};
use dubcast_storage::R2Client;
use dubcast_worker::{
    Collaborators, DubbingContext, DubbingService, InMemoryStore, TransformationStore,
    TranslationJob, WorkerConfig,
};

#[derive(Debug, Deserialize)]
struct DubRequest {
    project_id: i64,
    team_id: i64,
    /// Balance seeded into the in-process credit store
    credits: i64,
    /// Object-storage name of the source upload
    file_name: String,
    target_language: String,
    #[serde(default)]
    lip_sync: Option<bool>,
    #[serde(default)]
    voice: Option<String>,
}

#[tokio::main]
async fn main() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dubcast=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting dubcast-worker");

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker finished");
}

async fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: dubcast-worker <request.json>")?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let request: DubRequest = serde_json::from_str(&raw).context("parsing dubbing request")?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let runner = FfmpegRunner::new(config.max_ffmpeg_processes)
        .with_timeout(config.ffmpeg_timeout.as_secs());
    let media = Arc::new(FfmpegEngine::new(runner));

    let lip_syncer: Option<Arc<dyn LipSyncer>> = Some(Arc::new(
        ReplicateLipSync::from_env().context("Replicate lip-sync")?,
    ));

    let collaborators = Collaborators {
        translator: Arc::new(OpenAiTranslator::from_env().context("OpenAI translator")?),
        synthesizer: Arc::new(ElevenLabsSynthesizer::from_env().context("ElevenLabs synthesizer")?),
        lip_syncer,
        media,
    };

    let store = Arc::new(InMemoryStore::new().with_team(request.team_id, request.credits));
    let service = DubbingService::new(DubbingContext {
        config,
        transcriber: Arc::new(ReplicateTranscriber::from_env().context("Replicate transcriber")?),
        collaborators,
        objects: Arc::new(R2Client::from_env().context("R2 client")?),
        transformations: store.clone(),
        credits: store.clone(),
    });

    let source = service
        .create_transformation(request.project_id, &request.file_name, true, None)
        .await
        .context("transcribing source")?;
    let target = service
        .create_target_transformation(source.id, &request.target_language)
        .await
        .context("creating target transformation")?;

    let identifier =
        JobIdentifier::generate(request.project_id, &request.target_language, Utc::now());
    let voice = request
        .voice
        .as_deref()
        .map(VoiceSelector::parse)
        .unwrap_or_default();

    let finished = service
        .create_translation(TranslationJob {
            source: source.id,
            target: target.id,
            team_id: request.team_id,
            identifier,
            lip_sync: request.lip_sync,
            voice,
        })
        .await;

    match finished {
        Ok(row) => {
            println!("{}", serde_json::to_string_pretty(&row)?);
            Ok(())
        }
        Err(e) => {
            if let Ok(row) = store.get(target.id).await {
                warn!(status = %row.status.as_str(), progress = row.progress, "Job ended without output");
            }
            Err(e).context("dubbing job failed")
        }
    }
}

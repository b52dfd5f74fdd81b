//! Itinerary generation service binary.
//!
//! Reads video URLs from the command line, runs the full pipeline against
//! the in-memory store, and prints the generated itinerary as JSON.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use itinera_engine::{
    EngineConfig, FetchOrchestrator, GeminiSynthesizer, GenerationPipeline,
    HttpTranscriptTransport,
};
use itinera_models::TravelPreferences;
use itinera_proxy::{HttpListProvider, PoolConfig, ProxyPool};
use itinera_store::MemoryJobStore;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("itinera=info".parse().expect("valid directive"));

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

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if urls.is_empty() {
        eprintln!("usage: itinera <video-url> [<video-url> ...]");
        std::process::exit(2);
    }

    info!("Starting itinera");

    let engine_config = EngineConfig::from_env();
    let pool_config = PoolConfig::from_env();

    let synthesizer = match GeminiSynthesizer::from_env() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create synthesizer: {}", e);
            std::process::exit(1);
        }
    };

    let pool = Arc::new(ProxyPool::new(
        Arc::new(HttpListProvider::new(pool_config.clone())),
        pool_config,
    ));
    let transport = Arc::new(HttpTranscriptTransport::new(engine_config.attempt_timeout));
    let orchestrator = Arc::new(FetchOrchestrator::new(
        transport,
        pool,
        engine_config.clone(),
    ));
    let store = Arc::new(MemoryJobStore::new());
    let pipeline = Arc::new(GenerationPipeline::new(
        store,
        orchestrator,
        synthesizer,
        engine_config,
    ));

    let preferences = TravelPreferences::default();
    let job_id = match pipeline.submit(&urls, preferences).await {
        Ok(id) => id,
        Err(e) => {
            error!("Submission rejected: {}", e);
            std::process::exit(1);
        }
    };

    info!(job_id = %job_id, "Job submitted, running pipeline");
    if let Err(e) = pipeline.run(&job_id).await {
        error!(job_id = %job_id, "Generation failed: {}", e);
        std::process::exit(1);
    }

    match pipeline.poll(&job_id).await {
        Ok(snapshot) => match snapshot.itinerary {
            Some(itinerary) => {
                let json = serde_json::to_string_pretty(&itinerary)
                    .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
                println!("{json}");
            }
            None => {
                error!(job_id = %job_id, "Job finished without an itinerary");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(job_id = %job_id, "Failed to read job state: {}", e);
            std::process::exit(1);
        }
    }

    info!("Done");
}

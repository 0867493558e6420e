mod api;
mod config;
mod contracts;
mod error;
mod infra;
mod pipeline;
mod providers;
mod text_generation;
mod tts;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

use crate::{
  config::AppConfig, pipeline::Pipeline, text_generation::SentenceGenerator,
  tts::SpeechSynthesizer,
};

/// Usage: `stichwort [provider]`. The provider argument overrides `LLM_PROVIDER`.
#[tokio::main]
async fn main() -> Result<()> {
  // A missing .env file is fine, everything can come from the real environment.
  let _ = dotenv::dotenv();

  let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());

  let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

  let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

  let subscriber = Registry::default()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with(JsonStorageLayer)
    .with(bunyan_formatting_layer);

  tracing::subscriber::set_global_default(subscriber).context("unable to install tracing subscriber")?;

  let config = AppConfig::from_env(std::env::args().nth(1))?;

  tokio::fs::create_dir_all(&config.audio_dir)
    .await
    .with_context(|| format!("unable to create audio dir. path={}", config.audio_dir.display()))?;

  // Both clients are validated here, once, before the server accepts requests.
  let generator = SentenceGenerator::from_env(config.provider.as_deref())?;
  let synthesizer = SpeechSynthesizer::from_config(config.speech.clone())?;

  let pipeline = Arc::new(Pipeline::new(
    generator,
    synthesizer,
    config.audio_dir.clone(),
    api::STATIC_PREFIX,
  ));

  info!(
    "starting server. addr={} provider={} model={}",
    config.addr,
    pipeline.generator().provider_name(),
    pipeline.generator().model()
  );

  axum::Server::bind(&config.addr)
    .serve(api::router(pipeline, &config.audio_dir).into_make_service())
    .await
    .context("server stopped unexpectedly")?;

  Ok(())
}

use std::{net::SocketAddr, path::PathBuf};

use crate::{
  error::{Error, Result},
  infra::tts::CARTESIA_DEFAULT_BASE_URL,
  tts::SpeechConfig,
  utils::{self, non_blank},
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_AUDIO_DIR: &str = "static";
const DEFAULT_TTS_MODEL: &str = "sonic-turbo";
const DEFAULT_VOICE_ID: &str = "3264ada2-4a79-4666-badc-49e2267be692";
const DEFAULT_LANGUAGE: &str = "de";

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub addr: SocketAddr,
  pub audio_dir: PathBuf,
  /// Provider named on the command line. Takes precedence over `LLM_PROVIDER`.
  pub provider: Option<String>,
  pub speech: SpeechConfig,
}

impl AppConfig {
  pub fn from_env(provider: Option<String>) -> Result<Self> {
    Self::from_lookup(provider, utils::env_key)
  }

  pub fn from_lookup<F>(provider: Option<String>, env: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |key: &str, default: &str| non_blank(env(key)).unwrap_or_else(|| default.to_owned());

    let host = var("HOST", DEFAULT_HOST);

    let port = match non_blank(env("PORT")) {
      None => DEFAULT_PORT,
      Some(port) => port
        .parse::<u16>()
        .map_err(|err| Error::Configuration(format!("invalid PORT '{}'. error={}", port, err)))?,
    };

    let addr = format!("{}:{}", host, port)
      .parse::<SocketAddr>()
      .map_err(|err| {
        Error::Configuration(format!("invalid HOST '{}'. error={}", host, err))
      })?;

    Ok(Self {
      addr,
      audio_dir: PathBuf::from(var("AUDIO_DIR", DEFAULT_AUDIO_DIR)),
      provider: non_blank(provider),
      speech: SpeechConfig {
        // Checked when the synthesizer is built.
        api_key: var("CARTESIA_API_KEY", ""),
        base_url: var("CARTESIA_BASE_URL", CARTESIA_DEFAULT_BASE_URL),
        model_id: var("CARTESIA_MODEL_ID", DEFAULT_TTS_MODEL),
        voice_id: var("CARTESIA_VOICE_ID", DEFAULT_VOICE_ID),
        language: var("CARTESIA_LANGUAGE", DEFAULT_LANGUAGE),
      },
    })
  }
}

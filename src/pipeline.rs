use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::{
  error::{Error, Result},
  text_generation::SentenceGenerator,
  tts::SpeechSynthesizer,
};

/// What the caregiver gets back for one keyword list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Utterance {
  pub sentence: String,
  pub audio_url: String,
  #[serde(skip)]
  pub audio_path: PathBuf,
}

/// validate -> generate sentence -> synthesize speech.
///
/// Built once at startup and shared by every request.
pub struct Pipeline {
  generator: SentenceGenerator,
  synthesizer: SpeechSynthesizer,
  /// Where audio files are written.
  audio_dir: PathBuf,
  /// URL prefix the audio directory is served under.
  audio_url_prefix: String,
}

impl Pipeline {
  pub fn new(
    generator: SentenceGenerator,
    synthesizer: SpeechSynthesizer,
    audio_dir: PathBuf,
    audio_url_prefix: impl Into<String>,
  ) -> Self {
    Self {
      generator,
      synthesizer,
      audio_dir,
      audio_url_prefix: audio_url_prefix.into(),
    }
  }

  pub fn generator(&self) -> &SentenceGenerator {
    &self.generator
  }

  #[tracing::instrument(name = "Pipeline::run", skip_all, fields(request_id = tracing::field::Empty))]
  pub async fn run<S: AsRef<str>>(&self, keywords: &[S]) -> Result<Utterance> {
    let keywords: Vec<&str> = keywords
      .iter()
      .map(|keyword| keyword.as_ref().trim())
      .filter(|keyword| !keyword.is_empty())
      .collect();

    if keywords.is_empty() {
      return Err(Error::Validation(String::from("no keywords provided")));
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("request_id", &request_id.as_str());

    let sentence = self.generator.generate(&keywords[..]).await?;

    let file_name = format!("{}.wav", request_id);
    let audio_path = self.audio_dir.join(&file_name);

    let artifact = self.synthesizer.synthesize(&sentence, &audio_path).await?;

    info!(
      "utterance ready. file_name={} bytes_written={} format={:?}",
      file_name, artifact.bytes_written, artifact.format
    );

    Ok(Utterance {
      sentence,
      audio_url: format!("{}/{}", self.audio_url_prefix.trim_end_matches('/'), file_name),
      audio_path: artifact.path,
    })
  }
}

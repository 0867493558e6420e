use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::{
  contracts::{ByteStream, OutputFormat, SpeechBackend, SpeechRequest, Voice},
  error::{Error, Result},
  infra::tts::CartesiaBackend,
};

#[derive(Clone)]
pub struct SpeechConfig {
  pub api_key: String,
  pub base_url: String,
  pub model_id: String,
  pub voice_id: String,
  pub language: String,
}

impl std::fmt::Debug for SpeechConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SpeechConfig")
      .field("api_key", &"REDACTED")
      .field("base_url", &self.base_url)
      .field("model_id", &self.model_id)
      .field("voice_id", &self.voice_id)
      .field("language", &self.language)
      .finish()
  }
}

/// A finished audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
  pub path: PathBuf,
  pub format: OutputFormat,
  pub bytes_written: u64,
}

pub struct SpeechSynthesizer {
  config: SpeechConfig,
  backend: Arc<dyn SpeechBackend>,
}

impl SpeechSynthesizer {
  pub fn new(config: SpeechConfig, backend: Arc<dyn SpeechBackend>) -> Self {
    Self { config, backend }
  }

  /// Builds a synthesizer backed by Cartesia. Fails if no api key is configured.
  pub fn from_config(config: SpeechConfig) -> Result<Self> {
    if config.api_key.trim().is_empty() {
      return Err(Error::Configuration(String::from(
        "CARTESIA_API_KEY not set. speech synthesis is unavailable",
      )));
    }

    let backend = CartesiaBackend::new(&config.base_url, config.api_key.clone())?;

    Ok(Self::new(config, Arc::new(backend)))
  }

  fn request(&self, transcript: &str) -> SpeechRequest {
    SpeechRequest {
      model_id: self.config.model_id.clone(),
      transcript: transcript.to_owned(),
      voice: Voice {
        mode: String::from("id"),
        id: self.config.voice_id.clone(),
      },
      language: self.config.language.clone(),
      output_format: OutputFormat::wav_pcm_s16le(),
    }
  }

  /// Synthesizes `sentence` into a wav file at `output_path`.
  ///
  /// Audio is streamed into a temporary sibling file which replaces
  /// `output_path` only once every chunk has been written. On failure the
  /// temporary file is removed and `output_path` is left untouched.
  #[tracing::instrument(name = "SpeechSynthesizer::synthesize", skip_all, fields(output_path = %output_path.display()))]
  pub async fn synthesize(&self, sentence: &str, output_path: &Path) -> Result<AudioArtifact> {
    let sentence = sentence.trim();

    if sentence.is_empty() {
      return Err(Error::Validation(String::from("cannot synthesize an empty sentence")));
    }

    info!("generating speech. sentence={}", sentence);

    let request = self.request(sentence);

    let stream = self.backend.stream(&request).await?;

    let part = PartialFile::new(temp_path_for(output_path)?);

    let bytes_written = match write_stream(stream, part.path()).await {
      Ok(bytes_written) => bytes_written,
      Err(err) => {
        error!("speech stream failed. error={}", err);
        return Err(err);
      }
    };

    part.persist(output_path).await?;

    info!("speech file saved. bytes_written={}", bytes_written);

    Ok(AudioArtifact {
      path: output_path.to_owned(),
      format: request.output_format,
      bytes_written,
    })
  }
}

/// `dir/.name.<uuid>.part`, in the same directory so the final rename does not cross filesystems.
fn temp_path_for(output_path: &Path) -> Result<PathBuf> {
  let file_name = output_path
    .file_name()
    .and_then(|name| name.to_str())
    .ok_or_else(|| {
      Error::Validation(format!(
        "output path has no file name. path={}",
        output_path.display()
      ))
    })?;

  Ok(output_path.with_file_name(format!(".{}.{}.part", file_name, uuid::Uuid::new_v4())))
}

async fn write_stream(mut stream: ByteStream, path: &Path) -> Result<u64> {
  let io_error = |err: std::io::Error| {
    Error::Synthesis(format!(
      "unable to write audio file. path={} error={}",
      path.display(),
      err
    ))
  };

  let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;

  let mut bytes_written = 0_u64;

  while let Some(chunk) = stream.next().await {
    let chunk = chunk?;
    file.write_all(&chunk).await.map_err(io_error)?;
    bytes_written += chunk.len() as u64;
  }

  file.flush().await.map_err(io_error)?;
  file.sync_all().await.map_err(io_error)?;

  if bytes_written == 0 {
    return Err(Error::Synthesis(String::from("provider returned no audio")));
  }

  Ok(bytes_written)
}

/// Temporary audio file that is removed on drop unless it was persisted.
///
/// Covers the request future being dropped mid-stream, e.g. when the client
/// disconnects.
struct PartialFile {
  path: PathBuf,
  persisted: bool,
}

impl PartialFile {
  fn new(path: PathBuf) -> Self {
    Self {
      path,
      persisted: false,
    }
  }

  fn path(&self) -> &Path {
    &self.path
  }

  async fn persist(mut self, output_path: &Path) -> Result<()> {
    tokio::fs::rename(&self.path, output_path)
      .await
      .map_err(|err| {
        Error::Synthesis(format!(
          "unable to move audio into place. path={} error={}",
          output_path.display(),
          err
        ))
      })?;

    self.persisted = true;

    Ok(())
  }
}

impl Drop for PartialFile {
  fn drop(&mut self) {
    if self.persisted {
      return;
    }

    if let Err(err) = std::fs::remove_file(&self.path) {
      if err.kind() != std::io::ErrorKind::NotFound {
        warn!(
          "unable to remove partial audio file. path={} error={}",
          self.path.display(),
          err
        );
      }
    }
  }
}

#[cfg(test)]
mod synthesize_tests {
  use bytes::Bytes;
  use futures::stream;

  use super::*;
  use crate::contracts::MockSpeechBackend;

  fn config() -> SpeechConfig {
    SpeechConfig {
      api_key: "car-key".to_owned(),
      base_url: "http://localhost".to_owned(),
      model_id: "sonic-turbo".to_owned(),
      voice_id: "voice".to_owned(),
      language: "de".to_owned(),
    }
  }

  fn chunks(items: Vec<Result<&'static str>>) -> ByteStream {
    stream::iter(
      items
        .into_iter()
        .map(|item| item.map(|chunk| Bytes::from_static(chunk.as_bytes())))
        .collect::<Vec<_>>(),
    )
    .boxed()
  }

  fn leftover_part_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
      .filter(|name| name.ends_with(".part"))
      .collect()
  }

  #[tokio::test]
  async fn writes_chunks_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");

    let mut backend = MockSpeechBackend::new();
    backend
      .expect_stream()
      .withf(|request: &SpeechRequest| {
        request.transcript == "Bewege deine linke Schulter nach oben."
          && request.output_format == OutputFormat::wav_pcm_s16le()
          && request.voice.mode == "id"
          && request.language == "de"
      })
      .times(1)
      .returning(|_| Ok(chunks(vec![Ok("RIFF..."), Ok("...."), Ok("data")])));

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    let artifact = synthesizer
      .synthesize("Bewege deine linke Schulter nach oben.", &output_path)
      .await?;

    assert_eq!(b"RIFF.......data".to_vec(), std::fs::read(&output_path)?);
    assert_eq!(output_path, artifact.path);
    assert_eq!(15, artifact.bytes_written);
    assert!(leftover_part_files(dir.path()).is_empty());

    Ok(())
  }

  #[tokio::test]
  async fn failure_mid_stream_leaves_no_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");

    let mut backend = MockSpeechBackend::new();
    backend.expect_stream().returning(|_| {
      Ok(chunks(vec![
        Ok("RIFF..."),
        Err(Error::Synthesis("audio stream interrupted".to_owned())),
        Ok("data"),
      ]))
    });

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    let result = synthesizer.synthesize("Hebe den Arm!", &output_path).await;

    assert!(matches!(result, Err(Error::Synthesis(_))));
    assert!(!output_path.exists());
    assert!(leftover_part_files(dir.path()).is_empty());

    Ok(())
  }

  #[tokio::test]
  async fn cancelled_synthesis_leaves_no_partial_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");

    let (first_chunk_written, on_first_chunk_written) = futures::channel::oneshot::channel::<()>();

    let mut backend = MockSpeechBackend::new();
    backend.expect_stream().return_once(move |_| {
      Ok(
        stream::iter(vec![Ok(Bytes::from_static(b"RIFF..."))])
          .chain(stream::once(async move {
            let _ = first_chunk_written.send(());
            futures::future::pending::<Result<Bytes>>().await
          }))
          .boxed(),
      )
    });

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    tokio::select! {
      result = synthesizer.synthesize("Hebe den Arm!", &output_path) => {
        panic!("synthesis should still be streaming: {:?}", result)
      }
      _ = on_first_chunk_written => {}
    }

    assert!(!output_path.exists());
    assert!(leftover_part_files(dir.path()).is_empty());

    Ok(())
  }

  #[tokio::test]
  async fn failed_synthesis_keeps_previous_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");
    std::fs::write(&output_path, b"previous")?;

    let mut backend = MockSpeechBackend::new();
    backend
      .expect_stream()
      .returning(|_| Ok(chunks(vec![Err(Error::Synthesis("reset".to_owned()))])));

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    assert!(synthesizer.synthesize("Hebe den Arm!", &output_path).await.is_err());
    assert_eq!(b"previous".to_vec(), std::fs::read(&output_path)?);

    Ok(())
  }

  #[tokio::test]
  async fn successful_synthesis_replaces_previous_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");
    std::fs::write(&output_path, b"a much longer previous recording")?;

    let mut backend = MockSpeechBackend::new();
    backend
      .expect_stream()
      .returning(|_| Ok(chunks(vec![Ok("RIFF"), Ok("new")])));

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    synthesizer.synthesize("Hebe den Arm!", &output_path).await?;

    assert_eq!(b"RIFFnew".to_vec(), std::fs::read(&output_path)?);

    Ok(())
  }

  #[tokio::test]
  async fn empty_stream_is_a_synthesis_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");

    let mut backend = MockSpeechBackend::new();
    backend.expect_stream().returning(|_| Ok(chunks(vec![])));

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    let result = synthesizer.synthesize("Hebe den Arm!", &output_path).await;

    assert!(matches!(result, Err(Error::Synthesis(_))));
    assert!(!output_path.exists());

    Ok(())
  }

  #[tokio::test]
  async fn upstream_rejection_is_passed_through() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let output_path = dir.path().join("output.wav");

    let mut backend = MockSpeechBackend::new();
    backend
      .expect_stream()
      .returning(|_| Err(Error::Synthesis("provider returned status=401".to_owned())));

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    let result = synthesizer.synthesize("Hebe den Arm!", &output_path).await;

    assert!(matches!(result, Err(Error::Synthesis(_))));
    assert!(leftover_part_files(dir.path()).is_empty());

    Ok(())
  }

  #[tokio::test]
  async fn blank_sentence_is_rejected_before_calling_the_provider() {
    let mut backend = MockSpeechBackend::new();
    backend.expect_stream().times(0);

    let synthesizer = SpeechSynthesizer::new(config(), Arc::new(backend));

    let result = synthesizer
      .synthesize("  ", Path::new("unused/output.wav"))
      .await;

    assert!(matches!(result, Err(Error::Validation(_))));
  }

  #[test]
  fn from_config_requires_an_api_key() {
    let result = SpeechSynthesizer::from_config(SpeechConfig {
      api_key: " ".to_owned(),
      ..config()
    });

    assert!(matches!(result, Err(Error::Configuration(_))));
  }

  #[test]
  fn temp_path_is_a_hidden_sibling() -> Result<(), Box<dyn std::error::Error>> {
    let temp_path = temp_path_for(Path::new("static/abc.wav"))?;

    assert_eq!(Some(Path::new("static")), temp_path.parent());

    let name = temp_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(".abc.wav."), "name={}", name);
    assert!(name.ends_with(".part"), "name={}", name);

    Ok(())
  }
}

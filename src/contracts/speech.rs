use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::Result;

/// Audio arrives as an ordered sequence of chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
  pub mode: String,
  pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFormat {
  pub container: String,
  pub sample_rate: u32,
  pub encoding: String,
}

impl OutputFormat {
  /// 44.1kHz 16-bit little endian PCM in a wav container.
  pub fn wav_pcm_s16le() -> Self {
    Self {
      container: String::from("wav"),
      sample_rate: 44100,
      encoding: String::from("pcm_s16le"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechRequest {
  pub model_id: String,
  pub transcript: String,
  pub voice: Voice,
  pub language: String,
  pub output_format: OutputFormat,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
  /// Starts synthesis and returns the audio as it is produced.
  async fn stream(&self, request: &SpeechRequest) -> Result<ByteStream>;
}

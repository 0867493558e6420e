use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tracing::{error, info};

use crate::{
  contracts::{ByteStream, SpeechBackend, SpeechRequest},
  error::{Error, Result},
};

pub const CARTESIA_DEFAULT_BASE_URL: &str = "https://api.cartesia.ai";

const CARTESIA_VERSION: &str = "2024-06-10";

/// Only the connection is bounded. Long transcripts keep streaming for as long as they need.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CartesiaBackend {
  client: reqwest::Client,
  url: String,
  api_key: String,
}

impl CartesiaBackend {
  pub fn new(base_url: &str, api_key: String) -> Result<Self> {
    let client = reqwest::Client::builder()
      .connect_timeout(CONNECT_TIMEOUT)
      .build()
      .map_err(|err| Error::Configuration(format!("unable to build http client. error={}", err)))?;

    Ok(Self {
      client,
      url: format!("{}/tts/bytes", base_url.trim_end_matches('/')),
      api_key,
    })
  }
}

#[async_trait]
impl SpeechBackend for CartesiaBackend {
  #[tracing::instrument(name = "CartesiaBackend::stream", skip_all, fields(model_id = %request.model_id))]
  async fn stream(&self, request: &SpeechRequest) -> Result<ByteStream> {
    let response = self
      .client
      .post(&self.url)
      .header("X-API-Key", &self.api_key)
      .header("Cartesia-Version", CARTESIA_VERSION)
      .json(request)
      .send()
      .await
      .map_err(|err| {
        Error::Synthesis(format!(
          "request failed. url={} error={}",
          self.url,
          err.without_url()
        ))
      })?;

    let status = response.status();

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      error!("speech request rejected. status={} body={}", status, body);
      return Err(Error::Synthesis(format!(
        "provider returned status={} body={}",
        status, body
      )));
    }

    info!("speech stream opened. status={}", status);

    Ok(
      response
        .bytes_stream()
        .map_err(|err| {
          Error::Synthesis(format!(
            "audio stream interrupted. error={}",
            err.without_url()
          ))
        })
        .boxed(),
    )
  }
}

#[cfg(test)]
mod stream_tests {
  use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
  };

  use super::*;
  use crate::contracts::{OutputFormat, Voice};

  fn request() -> SpeechRequest {
    SpeechRequest {
      model_id: "sonic-turbo".to_owned(),
      transcript: "Bewege deine linke Schulter nach oben.".to_owned(),
      voice: Voice {
        mode: "id".to_owned(),
        id: "3264ada2-4a79-4666-badc-49e2267be692".to_owned(),
      },
      language: "de".to_owned(),
      output_format: OutputFormat::wav_pcm_s16le(),
    }
  }

  #[tokio::test]
  async fn streams_audio_bytes() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/tts/bytes"))
      .and(header("X-API-Key", "car-key"))
      .and(header("Cartesia-Version", CARTESIA_VERSION))
      .and(body_partial_json(serde_json::json!({
        "model_id": "sonic-turbo",
        "transcript": "Bewege deine linke Schulter nach oben.",
        "voice": { "mode": "id", "id": "3264ada2-4a79-4666-badc-49e2267be692" },
        "language": "de",
        "output_format": { "container": "wav", "sample_rate": 44100, "encoding": "pcm_s16le" },
      })))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....data".to_vec()))
      .expect(1)
      .mount(&server)
      .await;

    let backend = CartesiaBackend::new(&server.uri(), "car-key".to_owned())?;

    let chunks: Vec<bytes::Bytes> = backend.stream(&request()).await?.try_collect().await?;

    assert_eq!(b"RIFF....data".to_vec(), chunks.concat());

    Ok(())
  }

  #[tokio::test]
  async fn rejected_request_is_a_synthesis_error() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
      .and(path("/tts/bytes"))
      .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
      .mount(&server)
      .await;

    let backend = CartesiaBackend::new(&server.uri(), "wrong".to_owned())?;

    match backend.stream(&request()).await {
      Err(err @ Error::Synthesis(_)) => {
        assert!(err.to_string().contains("401"), "err={}", err);
        assert!(err.to_string().contains("invalid api key"), "err={}", err);
      }
      Err(other) => panic!("unexpected error: {:?}", other),
      Ok(_) => panic!("expected the request to fail"),
    }

    Ok(())
  }
}

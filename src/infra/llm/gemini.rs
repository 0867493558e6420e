use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
  contracts::{ChatBackend, ChatRequest, Completion},
  error::{Error, Result},
};

/// Candidate finish reasons that mean the model refused to answer.
const BLOCKING_FINISH_REASONS: [&str; 5] = [
  "SAFETY",
  "BLOCKLIST",
  "PROHIBITED_CONTENT",
  "SPII",
  "RECITATION",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  system_instruction: Content<'a>,
  contents: [Content<'a>; 1],
  generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<&'a str>,
  parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
  text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  prompt_feedback: Option<PromptFeedback>,
  error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content: Option<CandidateContent>,
  finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  block_reason: Option<String>,
  block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  message: String,
}

/// Google's native `generateContent` API.
pub struct GeminiBackend {
  client: reqwest::Client,
  base_url: String,
  api_key: String,
}

impl GeminiBackend {
  pub fn new(base_url: &str, api_key: String) -> Result<Self> {
    Ok(Self {
      client: super::http_client()?,
      base_url: base_url.to_owned(),
      api_key,
    })
  }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
  #[tracing::instrument(name = "GeminiBackend::complete", skip_all, fields(model = %request.model))]
  async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
    let body = GenerateContentRequest {
      system_instruction: Content {
        role: None,
        parts: [Part {
          text: &request.system,
        }],
      },
      contents: [Content {
        role: Some("user"),
        parts: [Part {
          text: &request.user,
        }],
      }],
      generation_config: GenerationConfig {
        temperature: request.temperature,
        max_output_tokens: request.max_tokens,
      },
    };

    let url = super::endpoint(
      &self.base_url,
      &format!("models/{}:generateContent", request.model),
    );

    let response = self
      .client
      .post(&url)
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|err| {
        Error::Generation(format!(
          "request failed. url={} error={}",
          url,
          err.without_url()
        ))
      })?;

    let status = response.status();

    let response_body_text = response
      .text()
      .await
      .map_err(|err| {
        Error::Generation(format!(
          "unable to read response body. error={}",
          err.without_url()
        ))
      })?;

    let parsed = serde_json::from_str::<GenerateContentResponse>(&response_body_text);

    if !status.is_success() {
      let message = match parsed {
        Ok(GenerateContentResponse {
          error: Some(api_error),
          ..
        }) => api_error.message,
        _ => response_body_text,
      };
      error!("generate content failed. status={} message={}", status, message);
      return Err(Error::Generation(format!(
        "provider returned status={} message={}",
        status, message
      )));
    }

    let response = parsed.map_err(|err| {
      error!(
        "unexpected generate content response. response={:?} error={:?}",
        response_body_text, err
      );
      Error::Generation(format!("unexpected response from provider. error={}", err))
    })?;

    interpret(response)
  }
}

fn interpret(response: GenerateContentResponse) -> Result<Completion> {
  if let Some(api_error) = response.error {
    return Err(Error::Generation(api_error.message));
  }

  if let Some(PromptFeedback {
    block_reason: Some(block_reason),
    block_reason_message,
  }) = response.prompt_feedback
  {
    warn!("prompt was blocked. block_reason={}", block_reason);

    let reason = match block_reason_message {
      Some(message) => format!("{}: {}", block_reason, message),
      None => block_reason,
    };

    return Ok(Completion::Blocked {
      reason: Some(reason),
    });
  }

  let candidate = match response.candidates.into_iter().next() {
    // No candidates and no feedback: the prompt was dropped without explanation.
    None => return Ok(Completion::Blocked { reason: None }),
    Some(candidate) => candidate,
  };

  info!("content generated. finish_reason={:?}", candidate.finish_reason);

  if let Some(finish_reason) = &candidate.finish_reason {
    if BLOCKING_FINISH_REASONS.contains(&finish_reason.as_str()) {
      return Ok(Completion::Blocked {
        reason: Some(finish_reason.clone()),
      });
    }
  }

  let text = candidate
    .content
    .map(|content| {
      content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<String>()
    })
    .unwrap_or_default();

  Ok(Completion::Text(text))
}

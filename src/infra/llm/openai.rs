use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
  contracts::{ChatBackend, ChatRequest, Completion},
  error::{Error, Result},
};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: [Message<'a>; 2],
  temperature: f32,
  max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)]
  choices: Vec<Choice>,
  error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: Option<ResponseMessage>,
  finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
  content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  message: String,
}

/// Chat completions over the OpenAI wire format. Groq, xAI and Gemini's
/// compatibility layer all accept it.
pub struct OpenAiCompatibleBackend {
  client: reqwest::Client,
  url: String,
  api_key: String,
}

impl OpenAiCompatibleBackend {
  pub fn new(base_url: &str, api_key: String) -> Result<Self> {
    Ok(Self {
      client: super::http_client()?,
      url: super::endpoint(base_url, "chat/completions"),
      api_key,
    })
  }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
  #[tracing::instrument(name = "OpenAiCompatibleBackend::complete", skip_all, fields(model = %request.model))]
  async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
    let body = ChatCompletionRequest {
      model: &request.model,
      messages: [
        Message {
          role: "system",
          content: &request.system,
        },
        Message {
          role: "user",
          content: &request.user,
        },
      ],
      temperature: request.temperature,
      max_tokens: request.max_tokens,
    };

    let response = self
      .client
      .post(&self.url)
      .bearer_auth(&self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|err| {
        Error::Generation(format!(
          "request failed. url={} error={}",
          self.url,
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

    let parsed = serde_json::from_str::<ChatCompletionResponse>(&response_body_text);

    if !status.is_success() {
      let message = match parsed {
        Ok(ChatCompletionResponse {
          error: Some(api_error),
          ..
        }) => api_error.message,
        _ => response_body_text,
      };
      error!("chat completion failed. status={} message={}", status, message);
      return Err(Error::Generation(format!(
        "provider returned status={} message={}",
        status, message
      )));
    }

    let response = parsed.map_err(|err| {
      error!(
        "unexpected chat completion response. response={:?} error={:?}",
        response_body_text, err
      );
      Error::Generation(format!("unexpected response from provider. error={}", err))
    })?;

    if let Some(api_error) = response.error {
      return Err(Error::Generation(api_error.message));
    }

    let choice = response
      .choices
      .into_iter()
      .next()
      .ok_or_else(|| Error::Generation(String::from("response contained no choices")))?;

    info!("chat completion finished. finish_reason={:?}", choice.finish_reason);

    if choice.finish_reason.as_deref() == Some("content_filter") {
      return Ok(Completion::Blocked {
        reason: choice.finish_reason,
      });
    }

    Ok(Completion::Text(
      choice
        .message
        .and_then(|message| message.content)
        .unwrap_or_default(),
    ))
  }
}

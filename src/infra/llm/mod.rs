mod gemini;
mod openai;

use std::{sync::Arc, time::Duration};

pub use gemini::GeminiBackend;
pub use openai::OpenAiCompatibleBackend;

use crate::{
  contracts::ChatBackend,
  error::{Error, Result},
  providers::{ApiStyle, ResolvedProvider},
};

pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the backend that speaks the provider's wire dialect.
pub fn backend_for(provider: &ResolvedProvider) -> Result<Arc<dyn ChatBackend>> {
  let base_url = provider
    .config
    .base_url
    .unwrap_or(OPENAI_DEFAULT_BASE_URL);

  let backend: Arc<dyn ChatBackend> = match provider.config.api {
    ApiStyle::OpenAiCompatible => Arc::new(OpenAiCompatibleBackend::new(
      base_url,
      provider.api_key.clone(),
    )?),
    ApiStyle::GeminiNative => Arc::new(GeminiBackend::new(base_url, provider.api_key.clone())?),
  };

  Ok(backend)
}

fn http_client() -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(REQUEST_TIMEOUT)
    .build()
    .map_err(|err| Error::Configuration(format!("unable to build http client. error={}", err)))
}

fn endpoint(base_url: &str, path: &str) -> String {
  format!("{}/{}", base_url.trim_end_matches('/'), path)
}

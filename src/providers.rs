use tracing::info;

use crate::{
  error::{Error, Result},
  utils::{self, non_blank},
};

/// Environment variable that selects the active text generation provider.
pub const PROVIDER_ENV_KEY: &str = "LLM_PROVIDER";

pub const DEFAULT_PROVIDER: &str = "groq_fast";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
  /// `POST {base_url}/chat/completions`.
  OpenAiCompatible,
  /// `POST {base_url}/models/{model}:generateContent`.
  GeminiNative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
  pub name: &'static str,
  /// None means the vendor's default endpoint.
  pub base_url: Option<&'static str>,
  pub api_key_env: &'static str,
  pub model: &'static str,
  pub api: ApiStyle,
}

pub static PROVIDERS: &[ProviderConfig] = &[
  ProviderConfig {
    name: "groq_fast",
    base_url: Some("https://api.groq.com/openai/v1"),
    api_key_env: "GROQ_API_KEY",
    model: "llama-3.1-8b-instant",
    api: ApiStyle::OpenAiCompatible,
  },
  ProviderConfig {
    name: "openai",
    base_url: None,
    api_key_env: "OPENAI_API_KEY",
    model: "gpt-4.1-mini",
    api: ApiStyle::OpenAiCompatible,
  },
  ProviderConfig {
    name: "xai_grok",
    base_url: Some("https://api.x.ai/v1"),
    api_key_env: "XAI_API_KEY",
    model: "grok-4-fast",
    api: ApiStyle::OpenAiCompatible,
  },
  // Gemini through its OpenAI compatibility layer.
  ProviderConfig {
    name: "gemini",
    base_url: Some("https://generativelanguage.googleapis.com/v1beta/openai/"),
    api_key_env: "GEMINI_API_KEY",
    model: "gemini-2.0-flash",
    api: ApiStyle::OpenAiCompatible,
  },
  // Same model, native API. Reports why a prompt was blocked.
  ProviderConfig {
    name: "gemini_native",
    base_url: Some("https://generativelanguage.googleapis.com/v1beta"),
    api_key_env: "GEMINI_API_KEY",
    model: "gemini-2.0-flash",
    api: ApiStyle::GeminiNative,
  },
];

/// A registry entry together with the credential that was found for it.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
  pub config: ProviderConfig,
  pub api_key: String,
}

impl std::fmt::Debug for ResolvedProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ResolvedProvider")
      .field("config", &self.config)
      .field("api_key", &"REDACTED")
      .finish()
  }
}

pub fn provider_names() -> Vec<&'static str> {
  PROVIDERS.iter().map(|provider| provider.name).collect()
}

pub fn lookup(name: &str) -> Result<&'static ProviderConfig> {
  PROVIDERS
    .iter()
    .find(|provider| provider.name == name)
    .ok_or_else(|| {
      Error::Configuration(format!(
        "unknown {} '{}'. valid options: {}",
        PROVIDER_ENV_KEY,
        name,
        provider_names().join(", ")
      ))
    })
}

/// Picks the active provider and checks that its credential is present.
///
/// The name comes from `explicit`, then from `LLM_PROVIDER`, then falls back
/// to [`DEFAULT_PROVIDER`].
pub fn resolve(explicit: Option<&str>) -> Result<ResolvedProvider> {
  resolve_with(explicit, utils::env_key)
}

/// Same as [`resolve`] but reads the environment through `env`.
pub fn resolve_with<F>(explicit: Option<&str>, env: F) -> Result<ResolvedProvider>
where
  F: Fn(&str) -> Option<String>,
{
  let name = non_blank(explicit.map(String::from))
    .or_else(|| non_blank(env(PROVIDER_ENV_KEY)))
    .unwrap_or_else(|| DEFAULT_PROVIDER.to_owned());

  let config = lookup(&name)?;

  let api_key = non_blank(env(config.api_key_env)).ok_or_else(|| {
    Error::Configuration(format!(
      "{} not set. please set the environment variable for provider '{}'",
      config.api_key_env, config.name
    ))
  })?;

  info!(
    "resolved text generation provider. provider={} model={}",
    config.name, config.model
  );

  Ok(ResolvedProvider {
    config: config.clone(),
    api_key,
  })
}

/// Failure of one stage of the keyword to speech pipeline.
///
/// Each variant maps to a different operator action: fix the configuration,
/// fix the input, look at the language model, or look at the speech service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("configuration error: {0}")]
  Configuration(String),
  #[error("invalid input: {0}")]
  Validation(String),
  #[error("sentence generation failed: {0}")]
  Generation(String),
  #[error("speech synthesis failed: {0}")]
  Synthesis(String),
}

impl Error {
  pub fn kind(&self) -> &'static str {
    match self {
      Error::Configuration(_) => "configuration",
      Error::Validation(_) => "validation",
      Error::Generation(_) => "generation",
      Error::Synthesis(_) => "synthesis",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

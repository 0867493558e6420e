use std::sync::Arc;

use tracing::{error, info};

use crate::{
  contracts::{ChatBackend, ChatRequest, Completion},
  error::{Error, Result},
  infra,
  providers::{self, ResolvedProvider},
};

/// Output contract for the model. Only enforced by instruction, the reply is
/// not checked against it.
pub const SYSTEM_PROMPT: &str = r#"Du bist ein Assistent für eine Physiotherapeutin, die Aphasie hat und keine vollständigen Sätze bilden kann.
Du musst eine Reihe von Stichwörtern, die sie dir gibt, in einen einzigen, klaren Anweisungssatz umwandeln, mit dem sie mit ihren Patientinnen und Patienten sprechen kann.
Deine Aufgabe ist es, aufgrund der Eingabewörter zu erraten, was die Intention der Therapeutin ist.
Wenn wir uns auf „Schmerz“ oder „es tut weh“ beziehen, meinen wir AUSSCHLIESSLICH die Symptome der Patientinnen und Patienten, niemals eine Eigenschaft des Satzes selbst.
Deine Ausgabe ist immer auf Deutsch, auch wenn die Eingabe auf Englisch ist.
Eingabewörter können die Zeichen „+“ und „-“ enthalten; sie stehen je nach Kontext für Stärke oder Richtung (z. B. mehr, weniger, heben, senken).
Das Zeichen „!“ ist immer als Imperativ zu verstehen, das Zeichen „?“ immer als Frage.
Zahlen werden so geschrieben, wie man sie auf Deutsch ausspricht.
Antworte mit genau einem einfachen Satz, ohne Erklärung und ohne Anführungszeichen. Keine Anweisungen für einen Roboter.

Beispiele:

Eingabe: Schulter, Hoch, Bewegen, Links
Ausgabe: Bewege deine linke Schulter nach oben.

Eingabe: Bein, ?, Schmerzen, Rechts
Ausgabe: Tut dein rechtes Bein weh?"#;

pub const LEAD_IN: &str = "Was möchte der Physiotherapeut ausdrücken? Stichworte";

pub const KEYWORD_SEPARATOR: &str = ", ";

/// Low so the same keywords keep producing the same sentence.
pub const TEMPERATURE: f32 = 0.2;

pub const MAX_TOKENS: u32 = 100;

/// Turns caregiver keywords into one German instruction.
///
/// Holds a provider that was validated once on construction. Cheap to share
/// behind an `Arc` across concurrent requests.
pub struct SentenceGenerator {
  provider: ResolvedProvider,
  backend: Arc<dyn ChatBackend>,
}

impl std::fmt::Debug for SentenceGenerator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SentenceGenerator")
      .field("provider", &self.provider)
      .field("backend", &"DOES NOT IMPLEMENT DEBUG")
      .finish()
  }
}

impl SentenceGenerator {
  pub fn new(provider: ResolvedProvider, backend: Arc<dyn ChatBackend>) -> Self {
    Self { provider, backend }
  }

  /// Resolves the active provider from `provider_name` or the environment and
  /// builds the backend for its wire dialect.
  #[tracing::instrument(name = "SentenceGenerator::from_env", skip_all)]
  pub fn from_env(provider_name: Option<&str>) -> Result<Self> {
    let provider = providers::resolve(provider_name)?;
    let backend = infra::llm::backend_for(&provider)?;
    Ok(Self::new(provider, backend))
  }

  pub fn provider_name(&self) -> &str {
    self.provider.config.name
  }

  pub fn model(&self) -> &str {
    self.provider.config.model
  }

  #[tracing::instrument(name = "SentenceGenerator::generate", skip_all, fields(
    provider = %self.provider.config.name,
    model = %self.provider.config.model
  ))]
  pub async fn generate<S: AsRef<str>>(&self, keywords: &[S]) -> Result<String> {
    if keywords.is_empty() {
      return Err(Error::Validation(String::from("no keywords provided")));
    }

    let request = ChatRequest {
      model: self.provider.config.model.to_owned(),
      system: SYSTEM_PROMPT.to_owned(),
      user: user_prompt(keywords),
      temperature: TEMPERATURE,
      max_tokens: MAX_TOKENS,
    };

    info!("sending keywords to llm. prompt={}", &request.user);

    match self.backend.complete(&request).await? {
      Completion::Blocked { reason } => {
        error!("model response was blocked. reason={:?}", reason);
        Err(Error::Generation(match reason {
          Some(reason) => format!("response blocked by provider: {}", reason),
          None => String::from("response blocked by provider"),
        }))
      }
      Completion::Text(text) => {
        let sentence = text.trim();

        if sentence.is_empty() {
          error!("empty response from model");
          return Err(Error::Generation(String::from("empty response from model")));
        }

        info!("sentence generated. sentence={}", sentence);

        Ok(sentence.to_owned())
      }
    }
  }
}

fn user_prompt<S: AsRef<str>>(keywords: &[S]) -> String {
  let keywords = keywords
    .iter()
    .map(|keyword| keyword.as_ref())
    .collect::<Vec<_>>()
    .join(KEYWORD_SEPARATOR);

  format!("{}: {}", LEAD_IN, keywords)
}

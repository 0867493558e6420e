pub mod chat;
pub mod speech;

pub use chat::{ChatBackend, ChatRequest, Completion};
pub use speech::{ByteStream, OutputFormat, SpeechBackend, SpeechRequest, Voice};

#[cfg(test)]
pub use chat::MockChatBackend;
#[cfg(test)]
pub use speech::MockSpeechBackend;

//! V-Try: virtual try-on with Gemini
//!
//! Load a clothing photo and a person photo, ask the Gemini image model to
//! dress the person in the clothing, and keep the single resulting image.

pub mod config;
pub mod gemini_client;
pub mod intake;
pub mod presentation;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{Config, GeminiConfig};
pub use gemini_client::{GeminiClient, GenerationError, InlineImage, TryOnGenerator};
pub use intake::{encode_file, intake, DataUrl, EncodedImage, IntakeError, IntakeSource, SourceFile};
pub use session::{GenerationJob, GenerationStatus, SessionState, SessionStatus, TryOnSession};

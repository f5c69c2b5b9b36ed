//! Test doubles shared by the unit and end-to-end tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::gemini_client::{GeminiClient, GenerationError, InlineImage, TryOnGenerator};

/// Replays a canned Gemini response body through the real parser
pub struct ScriptedGenerator {
    response: Result<String, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(InlineImage, InlineImage)>>,
}

impl ScriptedGenerator {
    /// Respond with this JSON body
    pub fn responding(body: serde_json::Value) -> Self {
        Self {
            response: Ok(body.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail with a configuration error carrying this message
    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(InlineImage, InlineImage)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl TryOnGenerator for ScriptedGenerator {
    async fn generate_try_on(
        &self,
        cloth: &InlineImage,
        person: &InlineImage,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some((cloth.clone(), person.clone()));

        match &self.response {
            Ok(body) => GeminiClient::parse_response(body),
            Err(message) => Err(GenerationError::Configuration(message.clone())),
        }
    }
}

/// A Gemini response with a text part followed by one inline PNG
pub fn png_response(data: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "parts": [
                    {"text": "Here is the try-on result."},
                    {"inlineData": {"mimeType": "image/png", "data": data}}
                ]
            }
        }]
    })
}

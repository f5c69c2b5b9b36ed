use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gemini_client::{GenerationError, InlineImage, TryOnGenerator};
use crate::intake::EncodedImage;

/// Message shown when a failure carries no text of its own
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Generation status; each variant carries only what is valid in that state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum GenerationStatus {
    Idle,
    Loading,
    Success { image: String },
    Error { message: String },
}

/// Payload-free view of [`GenerationStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Loading,
    Success,
    Error,
}

/// Status snapshot for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub ready: bool,
    pub error_message: Option<String>,
    pub has_result: bool,
    pub request_id: Option<String>,
}

/// Inputs copied out of the session at dispatch time
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub cloth: InlineImage,
    pub person: InlineImage,
}

/// Owns the two image slots and the generation status
pub struct TryOnSession {
    cloth: Option<EncodedImage>,
    person: Option<EncodedImage>,
    status: GenerationStatus,
    /// Job currently in flight
    pending: Option<Uuid>,
    /// Most recent job, kept for log correlation
    last_request: Option<Uuid>,
}

impl TryOnSession {
    pub fn new() -> Self {
        Self {
            cloth: None,
            person: None,
            status: GenerationStatus::Idle,
            pending: None,
            last_request: None,
        }
    }

    pub fn set_cloth_image(&mut self, image: Option<EncodedImage>) {
        debug!("Cloth slot {}", if image.is_some() { "set" } else { "cleared" });
        self.cloth = image;
    }

    pub fn set_person_image(&mut self, image: Option<EncodedImage>) {
        debug!("Person slot {}", if image.is_some() { "set" } else { "cleared" });
        self.person = image;
    }

    pub fn cloth_image(&self) -> Option<&EncodedImage> {
        self.cloth.as_ref()
    }

    pub fn person_image(&self) -> Option<&EncodedImage> {
        self.person.as_ref()
    }

    /// Both slots populated, whatever the status
    pub fn is_ready(&self) -> bool {
        self.cloth.is_some() && self.person.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status == GenerationStatus::Loading
    }

    /// Whether a generate request would be accepted right now
    pub fn can_generate(&self) -> bool {
        self.is_ready() && !self.is_loading()
    }

    pub fn generation_status(&self) -> &GenerationStatus {
        &self.status
    }

    /// Result of the last successful generation
    pub fn result(&self) -> Option<&str> {
        match &self.status {
            GenerationStatus::Success { image } => Some(image),
            _ => None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        let (state, error_message) = match &self.status {
            GenerationStatus::Idle => (SessionState::Idle, None),
            GenerationStatus::Loading => (SessionState::Loading, None),
            GenerationStatus::Success { .. } => (SessionState::Success, None),
            GenerationStatus::Error { message } => (SessionState::Error, Some(message.clone())),
        };

        SessionStatus {
            state,
            ready: self.is_ready(),
            error_message,
            has_result: self.result().is_some(),
            request_id: self.last_request.map(|id| id.to_string()),
        }
    }

    /// Move to Loading and hand out a copy of both inputs.
    ///
    /// Returns `None` without touching any state when a slot is empty or a
    /// request is already in flight.
    pub fn begin_generation(&mut self) -> Option<GenerationJob> {
        if self.is_loading() {
            debug!("Generate ignored: request already in flight");
            return None;
        }
        let (Some(cloth), Some(person)) = (&self.cloth, &self.person) else {
            debug!("Generate ignored: both images are required");
            return None;
        };

        let job = GenerationJob {
            id: Uuid::new_v4(),
            cloth: InlineImage::from(cloth),
            person: InlineImage::from(person),
        };

        info!("Session transitioning to Loading (request {})", job.id);
        self.status = GenerationStatus::Loading;
        self.pending = Some(job.id);
        self.last_request = Some(job.id);
        Some(job)
    }

    /// Record the outcome of a job. Returns false if the job is not the one in flight.
    pub fn finish_generation(
        &mut self,
        job_id: Uuid,
        outcome: Result<String, GenerationError>,
    ) -> bool {
        if self.pending != Some(job_id) {
            warn!("Ignoring completion for stale request {}", job_id);
            return false;
        }
        self.pending = None;

        match outcome {
            Ok(image) => {
                info!("Session transitioning to Success (request {})", job_id);
                self.status = GenerationStatus::Success { image };
            }
            Err(e) => {
                let message = user_message(e.to_string());
                warn!("Generation failed (request {}): {}", job_id, message);
                self.status = GenerationStatus::Error { message };
            }
        }
        true
    }

    /// Run one generation against `generator`. Returns false if nothing was dispatched.
    pub async fn generate(&mut self, generator: &dyn TryOnGenerator) -> bool {
        let Some(job) = self.begin_generation() else {
            return false;
        };
        let outcome = generator.generate_try_on(&job.cloth, &job.person).await;
        self.finish_generation(job.id, outcome)
    }

    /// Clear both slots and return to Idle
    pub fn reset(&mut self) {
        info!("Session resetting to Idle");
        self.cloth = None;
        self.person = None;
        self.status = GenerationStatus::Idle;
        self.pending = None;
        self.last_request = None;
    }
}

/// Failure text as shown to the user
fn user_message(raw: String) -> String {
    if raw.trim().is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        raw
    }
}

impl Default for TryOnSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::SourceFile;
    use crate::test_support::{png_response, ScriptedGenerator};

    fn image(name: &str, bytes: &[u8]) -> EncodedImage {
        EncodedImage::from_bytes(SourceFile::from_path(name), bytes)
    }

    fn ready_session() -> TryOnSession {
        let mut session = TryOnSession::new();
        session.set_cloth_image(Some(image("shirt.jpg", b"shirt")));
        session.set_person_image(Some(image("model.png", b"model")));
        session
    }

    #[test]
    fn test_initial_state() {
        let session = TryOnSession::new();
        assert_eq!(session.generation_status(), &GenerationStatus::Idle);
        assert!(!session.is_ready());
        assert!(session.result().is_none());
        assert!(session.status().request_id.is_none());
    }

    #[test]
    fn test_readiness_requires_both_slots() {
        let mut session = TryOnSession::new();
        session.set_cloth_image(Some(image("shirt.jpg", b"shirt")));
        assert!(!session.is_ready());

        session.set_person_image(Some(image("model.png", b"model")));
        assert!(session.is_ready());

        session.set_cloth_image(None);
        assert!(!session.is_ready());
    }

    #[test]
    fn test_readiness_ignores_status() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        assert!(session.is_ready());
        assert!(!session.can_generate());

        session.finish_generation(job.id, Err(GenerationError::NoImageReturned));
        assert!(session.is_ready());
        assert!(session.can_generate());
    }

    #[tokio::test]
    async fn test_generate_without_images_is_noop() {
        let generator = ScriptedGenerator::responding(png_response("iVBORw0KGgo="));
        let mut session = TryOnSession::new();
        session.set_person_image(Some(image("model.png", b"model")));

        assert!(!session.generate(&generator).await);
        assert_eq!(session.generation_status(), &GenerationStatus::Idle);
        assert_eq!(generator.call_count(), 0);
    }

    #[test]
    fn test_second_begin_while_loading_is_rejected() {
        let mut session = ready_session();
        let first = session.begin_generation();
        assert!(first.is_some());
        assert!(session.is_loading());

        assert!(session.begin_generation().is_none());
        assert!(session.is_loading());
    }

    #[tokio::test]
    async fn test_generate_while_loading_dispatches_nothing() {
        let generator = ScriptedGenerator::responding(png_response("iVBORw0KGgo="));
        let mut session = ready_session();
        let _in_flight = session.begin_generation().unwrap();

        assert!(!session.generate(&generator).await);
        assert_eq!(generator.call_count(), 0);
        assert!(session.is_loading());
    }

    #[tokio::test]
    async fn test_generate_success() {
        let generator = ScriptedGenerator::responding(png_response("iVBORw0KGgo="));
        let mut session = ready_session();

        assert!(session.generate(&generator).await);
        assert_eq!(generator.call_count(), 1);
        assert_eq!(session.result(), Some("data:image/png;base64,iVBORw0KGgo="));

        let status = session.status();
        assert_eq!(status.state, SessionState::Success);
        assert!(status.has_result);
        assert!(status.error_message.is_none());
        assert!(status.request_id.is_some());
    }

    #[tokio::test]
    async fn test_generate_sends_clothing_then_person() {
        let generator = ScriptedGenerator::responding(png_response("iVBORw0KGgo="));
        let mut session = ready_session();
        session.generate(&generator).await;

        let (cloth, person) = generator.last_request().unwrap();
        assert_eq!(cloth.mime_type, "image/jpeg");
        assert_eq!(cloth.data, session.cloth_image().unwrap().base64);
        assert_eq!(person.mime_type, "image/png");
        assert_eq!(person.data, session.person_image().unwrap().base64);
    }

    #[tokio::test]
    async fn test_generate_no_image_sets_error() {
        let generator = ScriptedGenerator::responding(serde_json::json!({"candidates": []}));
        let mut session = ready_session();

        assert!(session.generate(&generator).await);
        let status = session.status();
        assert_eq!(status.state, SessionState::Error);
        assert!(!status.error_message.unwrap().is_empty());
        assert!(session.result().is_none());
    }

    #[test]
    fn test_error_message_uses_failure_text() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        session.finish_generation(
            job.id,
            Err(GenerationError::Configuration("quota exceeded".to_string())),
        );

        let message = session.status().error_message.unwrap();
        assert!(message.contains("quota exceeded"));
    }

    #[test]
    fn test_error_message_falls_back_when_empty() {
        assert_eq!(user_message(String::new()), FALLBACK_ERROR_MESSAGE);
        assert_eq!(user_message("  ".to_string()), FALLBACK_ERROR_MESSAGE);
        assert_eq!(user_message("quota".to_string()), "quota");
    }

    #[test]
    fn test_begin_clears_previous_result() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        session.finish_generation(job.id, Ok("data:image/png;base64,AAAA".to_string()));
        assert!(session.result().is_some());

        session.begin_generation().unwrap();
        assert!(session.result().is_none());
        assert!(session.status().error_message.is_none());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();

        assert!(!session.finish_generation(Uuid::new_v4(), Ok("data:image/png;base64,AAAA".to_string())));
        assert!(session.is_loading());

        assert!(session.finish_generation(job.id, Ok("data:image/png;base64,BBBB".to_string())));
        assert!(!session.finish_generation(job.id, Ok("data:image/png;base64,CCCC".to_string())));
        assert_eq!(session.result(), Some("data:image/png;base64,BBBB"));
    }

    #[test]
    fn test_replacing_slot_does_not_affect_dispatched_job() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        let dispatched = job.cloth.clone();

        session.set_cloth_image(Some(image("dress.png", b"dress")));
        assert_eq!(job.cloth, dispatched);
        assert_eq!(job.cloth.mime_type, "image/jpeg");
    }

    #[test]
    fn test_removing_slot_keeps_result() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        session.finish_generation(job.id, Ok("data:image/png;base64,AAAA".to_string()));

        session.set_person_image(None);
        assert_eq!(session.result(), Some("data:image/png;base64,AAAA"));
        assert_eq!(session.status().state, SessionState::Success);
        assert!(!session.status().ready);
    }

    #[test]
    fn test_reset() {
        let mut session = ready_session();
        let job = session.begin_generation().unwrap();
        session.finish_generation(job.id, Err(GenerationError::NoImageReturned));

        session.reset();
        assert_eq!(session.generation_status(), &GenerationStatus::Idle);
        assert!(!session.is_ready());
        assert!(session.status().error_message.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let status = GenerationStatus::Error {
            message: "boom".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "boom");

        let snapshot = ready_session().status();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["ready"], true);
    }
}

//! Teacher-assistant advice service.
//!
//! Feeds a summary of the live classroom to an LLM and returns short
//! pedagogical advice. Failures never propagate to the caller: every
//! error path collapses into a canned, user-facing fallback string.

pub mod gemini;

use async_trait::async_trait;
use classpulse_room::RoomState;

pub use gemini::{GeminiClient, GeminiConfig};

/// Shown when the model returns an empty reply.
pub const FALLBACK_THINKING: &str =
    "Sorry, I need a moment to think -- please ask me again shortly!";
/// Shown when the service cannot be reached at all.
pub const FALLBACK_UNAVAILABLE: &str = "I cannot connect right now. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum AdviceError {
    #[error("advice service disabled: no api key")]
    Disabled,

    #[error("advice request failed: {0}")]
    Request(String),

    #[error("advice response malformed: {0}")]
    Malformed(String),
}

/// Counts extracted from the room snapshot, fed to the assistant as its
/// system instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassroomSummary {
    pub total_students: usize,
    pub finished: usize,
    pub needing_help: usize,
    pub hands_raised: usize,
}

impl From<&RoomState> for ClassroomSummary {
    fn from(state: &RoomState) -> Self {
        Self {
            total_students: state.students.len(),
            finished: state.count_finished(),
            needing_help: state.count_needing_help(),
            hands_raised: state.count_hands_raised(),
        }
    }
}

impl ClassroomSummary {
    /// The system instruction wrapping the teacher's question.
    pub fn system_instruction(&self) -> String {
        format!(
            "You are a wise, cheerful, and helpful primary-school teaching assistant.\n\
             Current classroom status:\n\
             - Total students: {}\n\
             - Students finished: {}\n\
             - Students needing help: {}\n\
             - Hands raised: {}\n\
             Give short, encouraging advice or activity suggestions based on \
             the teacher's question. Keep a friendly, pedagogical, positive tone.",
            self.total_students, self.finished, self.needing_help, self.hands_raised
        )
    }
}

/// Seam for the advice backend, so the app can run against a stub.
#[async_trait]
pub trait AdviceClient: Send + Sync {
    async fn advise(&self, prompt: &str, summary: &ClassroomSummary)
        -> Result<String, AdviceError>;
}

/// Ask for advice, mapping every failure to a user-facing string.
pub async fn advise_or_fallback(
    client: &dyn AdviceClient,
    prompt: &str,
    summary: &ClassroomSummary,
) -> String {
    match client.advise(prompt, summary).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => FALLBACK_THINKING.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "advice request failed");
            FALLBACK_UNAVAILABLE.to_string()
        }
    }
}

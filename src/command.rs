//! Hands a finished transcript to the language model and speaks the reply.

use crate::error::{Result, VoxbridgeError};
use crate::events::Announcer;
use crate::llm::LlmClient;
use std::sync::Arc;

/// Dispatches recognized commands to the LLM.
///
/// The call blocks the calling thread until the model answers or the HTTP
/// timeout fires.
#[derive(Clone)]
pub struct CommandHandler {
    llm: Arc<dyn LlmClient>,
    announcer: Announcer,
}

impl CommandHandler {
    pub fn new(llm: Arc<dyn LlmClient>, announcer: Announcer) -> Self {
        Self { llm, announcer }
    }

    /// Query the LLM with `transcript` and speak its reply.
    ///
    /// Connection, HTTP status and decoding failures become the spoken reply.
    /// Any other error is returned.
    pub fn handle(&self, transcript: &str) -> Result<()> {
        self.announcer.note("Sending query to LLM...");
        self.announcer.status("Querying LLM...");

        let reply = match self.llm.generate(transcript) {
            Ok(reply) => reply,
            Err(
                e @ (VoxbridgeError::LlmStatus { .. }
                | VoxbridgeError::LlmRequest { .. }
                | VoxbridgeError::LlmResponse { .. }),
            ) => {
                tracing::error!(error = %e, "LLM query failed");
                format!("Error connecting to LLM: {e}")
            }
            Err(e) => return Err(e),
        };

        if !reply.is_empty() {
            self.announcer.note(&format!("LLM Response: {reply}"));
            self.announcer.say(&reply);
        }
        Ok(())
    }
}

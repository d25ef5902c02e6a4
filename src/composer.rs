//! Response composer: turns a (prompt, context) pair into the reply text.
//!
//! The workflow decides *what* to say; the composer only decides *how*.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::session::Mode;

const MAX_REPLY_TOKENS: u32 = 400;

/// Phrases workflow output for the user.
#[async_trait]
pub trait ResponseComposer: Send + Sync {
    async fn compose(&self, mode: Mode, prompt: &str, context: &str) -> Result<String, LlmError>;
}

/// Who the assistant is and who it talks to.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub user_name: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            user_name: user_name.into(),
        }
    }

    fn system_prompt(&self, mode: Mode, context: &str) -> String {
        match mode {
            Mode::Fitness => format!(
                "You are {name}, {user}'s upbeat, no-nonsense fitness coach on a carnivore diet \
                 program. Context: {context} Only suggest foods from the active list; no \
                 vegetables, fruit or carbs. Rephrase the message you are given in your own \
                 voice, keeping every number, food and question in it. Keep the running tally \
                 of exercises and meals if it is present.",
                name = self.name,
                user = self.user_name,
            ),
            Mode::Chat => format!(
                "You are {name}, {user}'s warm, playful companion. Context: {context} Chat \
                 freely and be supportive; only bring up fitness if {user} does.",
                name = self.name,
                user = self.user_name,
            ),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new("Coach", "friend")
    }
}

/// Styles replies through an LLM.
pub struct LlmComposer {
    provider: Arc<dyn LlmProvider>,
    persona: Persona,
}

impl LlmComposer {
    pub fn new(provider: Arc<dyn LlmProvider>, persona: Persona) -> Self {
        Self { provider, persona }
    }
}

#[async_trait]
impl ResponseComposer for LlmComposer {
    async fn compose(&self, mode: Mode, prompt: &str, context: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(self.persona.system_prompt(mode, context)),
            ChatMessage::user(prompt),
        ])
        .with_max_tokens(MAX_REPLY_TOKENS);

        let response = self.provider.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Returns the prompt unchanged. Used without an API key and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughComposer;

#[async_trait]
impl ResponseComposer for PassthroughComposer {
    async fn compose(&self, _mode: Mode, prompt: &str, _context: &str) -> Result<String, LlmError> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, Role};
    use std::sync::Mutex;

    /// Records the last request and answers with a fixed string.
    struct RecordingProvider {
        last: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last.lock().unwrap() = Some(request);
            Ok(CompletionResponse {
                content: "  styled reply \n".into(),
                input_tokens: 1,
                output_tokens: 1,
            })
        }
    }

    #[tokio::test]
    async fn llm_composer_sends_persona_and_prompt() {
        let provider = Arc::new(RecordingProvider {
            last: Mutex::new(None),
        });
        let composer = LlmComposer::new(provider.clone(), Persona::new("Mo", "Joe"));

        let reply = composer
            .compose(Mode::Fitness, "Logged lunch.", "Foods: Bacon.")
            .await
            .unwrap();
        assert_eq!(reply, "styled reply");

        let req = provider.last.lock().unwrap().take().unwrap();
        assert_eq!(req.messages[0].role, Role::System);
        assert!(req.messages[0].content.contains("You are Mo, Joe's"));
        assert!(req.messages[0].content.contains("Foods: Bacon."));
        assert!(req.messages[0].content.contains("carnivore"));
        assert_eq!(req.messages[1].content, "Logged lunch.");
        assert_eq!(req.max_tokens, Some(MAX_REPLY_TOKENS));
    }

    #[tokio::test]
    async fn chat_mode_uses_companion_prompt() {
        let provider = Arc::new(RecordingProvider {
            last: Mutex::new(None),
        });
        let composer = LlmComposer::new(provider.clone(), Persona::default());
        composer.compose(Mode::Chat, "hey", "ctx").await.unwrap();

        let req = provider.last.lock().unwrap().take().unwrap();
        assert!(req.messages[0].content.contains("companion"));
        assert!(!req.messages[0].content.contains("carnivore"));
    }

    #[tokio::test]
    async fn passthrough_returns_prompt() {
        let reply = PassthroughComposer
            .compose(Mode::Fitness, "exact text", "ignored")
            .await
            .unwrap();
        assert_eq!(reply, "exact text");
    }
}

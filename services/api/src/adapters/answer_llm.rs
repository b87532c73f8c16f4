//! services/api/src/adapters/answer_llm.rs
//!
//! This module contains the adapter for the tutor LLM that answers new doubts.
//! It implements the `AnswerGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use doubt_forum_core::ports::{AnswerGenerationService, PortError, PortResult};
use regex::Regex;

const SYSTEM_INSTRUCTIONS: &str = "You are a patient university tutor. Answer the student's question accurately and concisely, in plain text. Do not use markdown.";

//=========================================================================================
// Markdown Cleanup
//=========================================================================================

/// Strips the markdown the model tends to emit even when asked not to.
#[derive(Debug, Clone)]
pub struct MarkdownCleaner {
    code_block: Regex,
    heading: Regex,
    bold: Regex,
    italic: Regex,
    inline_code: Regex,
}

impl MarkdownCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            code_block: Regex::new(r"(?s)```.*?```")?,
            heading: Regex::new(r"(?m)^#{1,6}\s+")?,
            bold: Regex::new(r"\*\*([^*]+)\*\*")?,
            italic: Regex::new(r"\*([^*]+)\*")?,
            inline_code: Regex::new(r"`([^`]+)`")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let text = self.code_block.replace_all(text, "");
        let text = self.heading.replace_all(&text, "");
        let text = self.bold.replace_all(&text, "$1");
        let text = self.italic.replace_all(&text, "$1");
        let text = self.inline_code.replace_all(&text, "$1");
        text.trim().to_string()
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AnswerGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnswerAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    cleaner: MarkdownCleaner,
}

impl OpenAiAnswerAdapter {
    /// Creates a new `OpenAiAnswerAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            model,
            cleaner: MarkdownCleaner::new()?,
        })
    }
}

//=========================================================================================
// `AnswerGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AnswerGenerationService for OpenAiAnswerAdapter {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Answer LLM response contained no text content.".to_string())
            })?;

        Ok(self.cleaner.clean(&raw))
    }
}

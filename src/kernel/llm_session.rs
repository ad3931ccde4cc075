//! The `llm_session` module encapsulates a conversational session with a Language Learning Model (LLM).
//! It provides the foundational tools necessary for real-time, back-and-forth interactions with the LLM,
//! ensuring that both the user's queries and the LLM's responses are managed and tracked efficiently within
//! specified token limits to comply with model constraints.
//!
//! At its core is the `LLMSession` structure, responsible for maintaining a running dialogue history
//! while adhering to the token limitations of the LLM. This allows for contextualized exchanges that build
//! upon previous interactions without exceeding the model's capacity. This session-centric design
//! enables developers to harness it for applications requiring dynamic conversations, such as chatbots,
//! virtual assistants, or interactive teaching tools.
//!
//! With methods like `send_message`, users can seamlessly communicate with the LLM, while utilities
//! like `set_system_prompt` offer ways to guide or pivot the direction of the conversation. The session
//! automatically manages the conversation history, trimming older messages as necessary to stay within
//! the token limits. In essence, this module bridges user inputs and sophisticated model responses,
//! orchestrating intelligent and coherent dialogues with the LLM.
//!
//! ## Example Usage
//!
//! ```rust
//! use ali_kernel::clients::openai::OpenAIClient;
//! use ali_kernel::LLMSession;
//! use ali_kernel::client_wrapper::Role;
//! use std::sync::Arc;
//!
//! let secret_key = "YOUR_OPENAI_SECRET_KEY";
//! let model_name = "gpt-4";
//! let openai_client = Arc::new(OpenAIClient::new_with_model_string(secret_key, model_name));
//! let system_prompt = "You are an AI assistant.";
//! let max_tokens = 8000; // Adjust based on the model's token limit
//! let mut session = LLMSession::new(openai_client, system_prompt.to_string(), max_tokens);
//! ```
//!
//! ```rust ignore
//! let response = session
//!     .send_message(Role::User, "Hello, World!".to_string(), None)
//!     .await
//!     .unwrap();
//! println!("Assistant: {}", response.content);
//! ```
//!
//! The session's history grows with each interaction but remains within the token constraints of the LLM.
//! The `LLMSession` handles token limit management internally, so you don't need to manually truncate older parts
//! of the conversation.
//!
//! ## Notes
//!
//! - **Token Counting:** The session uses an approximate method to estimate the number of tokens, assuming
//!   one token per 4 characters. This approximation works reasonably well for English text but may not be exact.
//! - **Error Handling:** Ensure to handle potential errors, especially when exceeding token limits.
//! - **Customization:** You can adjust `max_tokens` based on the model's capabilities and your application's needs.

use std::sync::Arc;

use crate::kernel::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};

/// Represents a conversational session with an LLM (Language Learning Model).
///
/// `LLMSession` allows for real-time, back-and-forth interactions with the LLM while maintaining
/// a history of the conversation. This ensures that exchanges with the model are contextualized,
/// building upon previous interactions for a more coherent and intelligent dialogue.
pub struct LLMSession {
    /// The client used for sending messages and communicating with the LLM.
    client: Arc<dyn ClientWrapper>,
    /// The system prompt for the session as a `Message`.
    system_prompt: Message,
    /// A vector that keeps the conversation history excluding the system prompt.
    conversation_history: Vec<Message>,
    /// The maximum number of tokens allowed in the conversation.
    max_tokens: usize,
    /// The current total token count.
    token_count: usize,
}

impl LLMSession {
    /// Creates a new `LLMSession` with the given client and system prompt.
    /// Initializes the conversation history and sets a default maximum token limit.
    pub fn new(client: Arc<dyn ClientWrapper>, system_prompt: String, max_tokens: usize) -> Self {
        let system_prompt_message = Message {
            role: Role::System,
            content: Arc::from(system_prompt.as_str()),
            tool_calls: vec![],
        };
        let system_prompt_tokens = count_message_tokens(&system_prompt_message);
        LLMSession {
            client,
            system_prompt: system_prompt_message,
            conversation_history: Vec::new(),
            max_tokens,
            token_count: system_prompt_tokens,
        }
    }

    /// Sends a message to the LLM and updates the conversation history.
    /// Maintains the conversation history within the specified token limit.
    /// Returns the response from the LLM.
    ///
    /// `tools`, when `Some`, is forwarded to the underlying
    /// [`ClientWrapper::send_message`] so the provider can perform native
    /// function calling.
    pub async fn send_message(
        &mut self,
        role: Role,
        content: String,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn std::error::Error>> {
        let message = Message {
            role,
            content: Arc::from(content.as_str()),
            tool_calls: vec![],
        };

        let message_tokens = count_message_tokens(&message);
        self.token_count += message_tokens;
        self.conversation_history.push(message);
        self.trim_conversation_history();

        // Temporarily add the system prompt to the start of the conversation history
        self.conversation_history
            .insert(0, self.system_prompt.clone());

        let response = self
            .client
            .send_message(&self.conversation_history, tools)
            .await?;

        // Remove the system prompt from the conversation history
        self.conversation_history.remove(0);

        let response_tokens = count_message_tokens(&response);
        self.token_count += response_tokens;
        self.conversation_history.push(response);
        self.trim_conversation_history();

        Ok(self.conversation_history.last().unwrap().clone())
    }

    /// Append a message to the conversation history without contacting the LLM.
    ///
    /// Used to seed a session from a prior conversation (e.g. when forking an
    /// [`Agent`](crate::Agent)) or to inject a tool result prior to the next
    /// [`LLMSession::send_message`] call.
    pub fn inject_message(&mut self, role: Role, content: String) {
        let message = Message {
            role,
            content: Arc::from(content.as_str()),
            tool_calls: vec![],
        };
        self.token_count += count_message_tokens(&message);
        self.conversation_history.push(message);
        self.trim_conversation_history();
    }

    /// Sets a new system prompt for the session.
    /// Updates the token count accordingly.
    pub fn set_system_prompt(&mut self, prompt: String) {
        let old_prompt_tokens = count_message_tokens(&self.system_prompt);

        self.system_prompt = Message {
            role: Role::System,
            content: Arc::from(prompt.as_str()),
            tool_calls: vec![],
        };

        let new_prompt_tokens = count_message_tokens(&self.system_prompt);
        self.token_count = self.token_count - old_prompt_tokens + new_prompt_tokens;
    }

    /// Borrow the current system prompt text.
    pub fn system_prompt_text(&self) -> &str {
        &self.system_prompt.content
    }

    /// Borrow the conversation history, excluding the system prompt.
    pub fn get_conversation_history(&self) -> &[Message] {
        &self.conversation_history
    }

    /// Borrow the underlying client used to communicate with the LLM.
    pub fn client(&self) -> &Arc<dyn ClientWrapper> {
        &self.client
    }

    /// Return the configured maximum token budget for this session.
    pub fn get_max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Trims the conversation history to ensure the total token count does not exceed max_tokens.
    fn trim_conversation_history(&mut self) {
        while self.token_count > self.max_tokens {
            if !self.conversation_history.is_empty() {
                let removed_message = self.conversation_history.remove(0);
                let removed_tokens = count_message_tokens(&removed_message);
                self.token_count -= removed_tokens;
            } else {
                break;
            }
        }
    }
}

/// Estimates the number of tokens in a string.
/// Uses an approximate formula: one token per 4 characters.
fn count_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

/// Estimates the number of tokens in a Message, including role annotations if necessary.
fn count_message_tokens(message: &Message) -> usize {
    let role_token_count = 1;
    let content_token_count = count_tokens(&message.content);
    role_token_count + content_token_count
}

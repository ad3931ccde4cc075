//! Local OpenAI-compatible relay client.
//!
//! Targets a same-host (or LAN) process that speaks the OpenAI Chat
//! Completions wire format — an `ollama serve`, `llama.cpp`'s `server`
//! binary, LM Studio's local server, or a corporate HTTP proxy in front of a
//! hosted vendor. Delegates to [`OpenAIClient`] exactly as
//! [`GrokClient`](crate::clients::grok::GrokClient) does, with the one
//! difference that matters for a local relay: requests carry whatever
//! bearer token the relay expects (often none at all), never a real vendor
//! credential, since the relay itself owns that.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ali_kernel::client_wrapper::{ClientWrapper, Message, Role};
//! use ali_kernel::clients::local_relay::LocalRelayClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LocalRelayClient::new("llama3", "http://127.0.0.1:11434/v1");
//!     let reply = client
//!         .send_message(
//!             &[Message {
//!                 role: Role::User,
//!                 content: Arc::<str>::from("Hello from the relay."),
//!                 tool_calls: vec![],
//!             }],
//!             None,
//!         )
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use crate::client_wrapper::{TokenUsage, ToolDefinition};
use crate::clients::openai::OpenAIClient;
use crate::{ClientWrapper, Message};
use async_trait::async_trait;
use std::error::Error;
use tokio::sync::Mutex;

/// Default base URL for a relay running on the same host (Ollama's default
/// OpenAI-compatible port).
pub const DEFAULT_LOCAL_RELAY_URL: &str = "http://127.0.0.1:11434/v1";

/// Client wrapper for a local OpenAI-compatible relay.
pub struct LocalRelayClient {
    delegate_client: OpenAIClient,
    model: String,
}

impl LocalRelayClient {
    /// Construct a client against the default local relay URL. Most local
    /// relays don't check the bearer token, so an empty key is supplied; use
    /// [`LocalRelayClient::new_with_key`] for a relay that does enforce one.
    pub fn new(model_name: &str, base_url: &str) -> Self {
        Self::new_with_key("", model_name, base_url)
    }

    /// Construct a client against a local relay that does check a bearer token.
    pub fn new_with_key(key: &str, model_name: &str, base_url: &str) -> Self {
        LocalRelayClient {
            delegate_client: OpenAIClient::new_with_base_url(key, model_name, base_url),
            model: model_name.to_string(),
        }
    }
}

#[async_trait]
impl ClientWrapper for LocalRelayClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error>> {
        self.delegate_client.send_message(messages, tools).await
    }

    fn send_message_stream<'a>(
        &'a self,
        messages: &'a [Message],
        tools: Option<Vec<ToolDefinition>>,
    ) -> crate::client_wrapper::MessageStreamFuture<'a> {
        self.delegate_client.send_message_stream(messages, tools)
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        self.delegate_client.usage_slot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url_points_at_localhost() {
        assert!(DEFAULT_LOCAL_RELAY_URL.starts_with("http://127.0.0.1"));
    }

    #[test]
    fn model_name_matches_constructor_argument() {
        let client = LocalRelayClient::new("llama3", DEFAULT_LOCAL_RELAY_URL);
        assert_eq!(client.model_name(), "llama3");
    }
}

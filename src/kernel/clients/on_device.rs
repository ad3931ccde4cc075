//! On-device, OS-provided model backend.
//!
//! Unlike the other four backends in this module, there is no HTTP wire
//! format to speak here — the actual inference happens inside a
//! platform-specific runtime (Apple's on-device Foundation Models framework,
//! Windows' Copilot Runtime, etc.) that a host application links against
//! its own platform SDK to reach. That FFI binding is explicitly out of
//! scope for this crate (it isn't portable Rust), so [`OnDeviceClient`]
//! exposes the seam instead: a host supplies an `infer` closure that calls
//! into whatever native API it has, and this wrapper adapts that closure to
//! [`ClientWrapper`] so the rest of the orchestration runtime (cost
//! controller, delegation executor, orchestrator) can address it exactly
//! like any HTTP-backed provider.
//!
//! A client constructed with [`OnDeviceClient::unavailable`] (no closure
//! supplied) always fails with [`ProviderErrorKind::NotInitialized`],
//! matching how the provider abstraction's contract says an unconfigured
//! backend should behave.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ali_kernel::client_wrapper::{ClientWrapper, Message, Role};
//! use ali_kernel::clients::on_device::OnDeviceClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // A host linking against a real on-device runtime would supply a
//!     // closure that calls into it; here we simulate one for the example.
//!     let client = OnDeviceClient::with_inference_fn("on-device-small", |messages| {
//!         let last = messages.last().map(|m| m.content.to_string()).unwrap_or_default();
//!         Ok(format!("(on-device) {last}"))
//!     });
//!     let reply = client
//!         .send_message(
//!             &[Message { role: Role::User, content: Arc::<str>::from("Hi"), tool_calls: vec![] }],
//!             None,
//!         )
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use crate::client_wrapper::{Message, Role, TokenUsage, ToolDefinition};
use crate::kernel::provider::{ProviderError, ProviderErrorKind};
use crate::ClientWrapper;
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A host-supplied binding into a native, on-device inference runtime.
/// Takes the full message history and returns the assistant's reply text
/// synchronously — the native SDKs this wraps are typically synchronous or
/// callback-based rather than `async`, so the adapter below runs the
/// closure inside `spawn_blocking`.
pub type InferenceFn = dyn Fn(&[Message]) -> Result<String, String> + Send + Sync;

/// Client wrapper over an on-device, OS-provided model.
pub struct OnDeviceClient {
    model: String,
    infer: Option<Arc<InferenceFn>>,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OnDeviceClient {
    /// A client with no native binding wired in. Every call fails with
    /// [`ProviderErrorKind::NotInitialized`] — the honest answer when the
    /// host hasn't linked the platform SDK this backend needs.
    pub fn unavailable(model_name: &str) -> Self {
        Self { model: model_name.to_string(), infer: None, token_usage: Mutex::new(None) }
    }

    /// A client backed by a real (or test-simulated) inference closure.
    pub fn with_inference_fn(
        model_name: &str,
        infer: impl Fn(&[Message]) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            model: model_name.to_string(),
            infer: Some(Arc::new(infer)),
            token_usage: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClientWrapper for OnDeviceClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn Error>> {
        let Some(infer) = self.infer.clone() else {
            let err = ProviderError::new(
                ProviderErrorKind::NotInitialized,
                "on-device runtime not linked by host application",
            );
            crate::kernel::provider::set_last_error(err.clone());
            return Err(Box::new(err));
        };

        let owned_messages: Vec<Message> = messages.to_vec();
        let reply = tokio::task::spawn_blocking(move || infer(&owned_messages))
            .await
            .map_err(|join_err| -> Box<dyn Error> {
                Box::new(ProviderError::new(
                    ProviderErrorKind::Unknown,
                    format!("on-device inference task panicked: {join_err}"),
                ))
            })?
            .map_err(|msg| -> Box<dyn Error> {
                Box::new(ProviderError::new(ProviderErrorKind::Unknown, msg))
            })?;

        let input_tokens = crate::kernel::provider::estimate_tokens(
            &messages.iter().map(|m| m.content.as_ref()).collect::<Vec<_>>().join("\n"),
        );
        let output_tokens = crate::kernel::provider::estimate_tokens(&reply);
        *self.token_usage.lock().await = Some(TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        });

        Ok(Message { role: Role::Assistant, content: Arc::from(reply.as_str()), tool_calls: vec![] })
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}

// `Message` doesn't derive `Clone`'s bound used above unless content/tool_calls
// are clonable; both already are (`Arc<str>` and `Vec<NativeToolCall>` with
// `#[derive(Clone)]` on `NativeToolCall`), and `Message` itself derives
// `Clone`, so `messages.to_vec()` above is valid.

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_client_reports_not_initialized() {
        let client = OnDeviceClient::unavailable("on-device-small");
        let messages = vec![Message { role: Role::User, content: Arc::from("hi"), tool_calls: vec![] }];
        let err = client.send_message(&messages, None).await.unwrap_err();
        assert!(err.to_string().contains("not_initialized"));
    }

    #[tokio::test]
    async fn wired_client_echoes_through_inference_fn() {
        let client = OnDeviceClient::with_inference_fn("on-device-small", |messages| {
            Ok(format!("echo:{}", messages.last().unwrap().content))
        });
        let messages = vec![Message { role: Role::User, content: Arc::from("hi"), tool_calls: vec![] }];
        let reply = client.send_message(&messages, None).await.unwrap();
        assert_eq!(reply.content.as_ref(), "echo:hi");
        let usage = client.get_last_usage().await.unwrap();
        assert!(usage.total_tokens > 0);
    }
}

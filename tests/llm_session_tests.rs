use async_trait::async_trait;
use ali_kernel::client_wrapper;
use ali_kernel::client_wrapper::{ClientWrapper, Message, Role, TokenUsage, ToolDefinition};
use ali_kernel::LLMSession;
use std::sync::Arc;
use tokio::sync::Mutex;

// Mock client for testing
struct MockClient {
    usage: Mutex<Option<TokenUsage>>,
    response_content: String,
    last_message_count: Mutex<usize>,
}

impl MockClient {
    fn new(response_content: String) -> Self {
        Self {
            usage: Mutex::new(None),
            response_content,
            last_message_count: Mutex::new(0),
        }
    }

    async fn get_last_message_count(&self) -> usize {
        *self.last_message_count.lock().await
    }

    async fn set_usage(&self, input: usize, output: usize, total: usize) {
        let mut usage = self.usage.lock().await;
        *usage = Some(client_wrapper::TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
        });
    }
}

#[async_trait]
impl ClientWrapper for MockClient {
    async fn send_message(
        &self,
        messages: &[Message],
        _tools: Option<Vec<ToolDefinition>>,
    ) -> Result<Message, Box<dyn std::error::Error>> {
        let mut count_guard = self.last_message_count.lock().await;
        *count_guard = messages.len();

        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(self.response_content.as_str()),
            tool_calls: vec![],
        })
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.usage)
    }
}

#[tokio::test]
async fn test_usage_tracked_through_session() {
    let mock_client = Arc::new(MockClient::new("Response".to_string()));
    let mut session = LLMSession::new(mock_client.clone(), "System prompt".to_string(), 1000);

    let user_message = "Hello, this is a test message";
    mock_client.set_usage(100, 50, 150).await;

    let response = session
        .send_message(Role::User, user_message.to_string(), None)
        .await
        .unwrap();

    assert_eq!(response.content.as_ref(), "Response");
    assert_eq!(session.get_conversation_history().len(), 2); // user message + response

    let usage = mock_client.get_last_usage().await.unwrap();
    assert_eq!(usage.total_tokens, 150);
}

#[tokio::test]
async fn test_trimming_drops_oldest_messages() {
    let mock_client = Arc::new(MockClient::new("Response".to_string()));
    let mut session = LLMSession::new(
        mock_client.clone(),
        "System prompt".to_string(),
        20, // small budget to force trimming
    );

    for i in 0..5 {
        let _ = session
            .send_message(Role::User, format!("message {i}"), None)
            .await;
    }

    // History should never be allowed to grow unbounded under a tight budget.
    assert!(session.get_conversation_history().len() < 10);
}

#[tokio::test]
async fn test_pre_transmission_trimming() {
    let client = Arc::new(MockClient::new("Response".to_string()));

    // System prompt "System" plus a small budget forces trimming before transmission.
    let mut session = LLMSession::new(client.clone(), "System".to_string(), 20);

    let _ = session.send_message(Role::User, "Msg1".to_string(), None).await;
    let _ = session.send_message(Role::User, "Msg2".to_string(), None).await;
    let _ = session.send_message(Role::User, "Msg3".to_string(), None).await;

    let large_msg = "0123456789012345678901234567890123456789"; // 40 chars
    let _ = session
        .send_message(Role::User, large_msg.to_string(), None)
        .await;

    let message_count = client.get_last_message_count().await;

    assert!(
        message_count > 0,
        "Should have sent at least the system prompt and new message"
    );
    assert!(
        message_count < 9,
        "Should have trimmed some messages before transmission"
    );

    assert!(
        !session.get_conversation_history().is_empty(),
        "Conversation history should not be empty"
    );
}

#[tokio::test]
async fn test_no_trimming_when_under_limit() {
    let client = Arc::new(MockClient::new("OK".to_string()));

    // Large max_tokens limit - no trimming should occur
    let mut session = LLMSession::new(client.clone(), "System".to_string(), 10000);

    let _ = session.send_message(Role::User, "Hi".to_string(), None).await;
    let _ = session.send_message(Role::User, "Hello".to_string(), None).await;

    // system + first user + first assistant + second user = 4 messages
    let message_count = client.get_last_message_count().await;
    assert_eq!(
        message_count, 4,
        "Should have sent all messages without trimming"
    );
}

#[tokio::test]
async fn test_history_grows_across_calls() {
    let client = Arc::new(MockClient::new("Response".to_string()));
    let mut session = LLMSession::new(
        client.clone() as Arc<dyn ClientWrapper>,
        "System prompt".to_string(),
        10_000,
    );

    let _ = session.send_message(Role::User, "First".to_string(), None).await;
    let count1 = client.get_last_message_count().await;
    assert_eq!(count1, 2);

    let _ = session.send_message(Role::User, "Second".to_string(), None).await;
    let count2 = client.get_last_message_count().await;
    assert_eq!(count2, 4);

    let _ = session.send_message(Role::User, "Third".to_string(), None).await;
    let count3 = client.get_last_message_count().await;
    assert_eq!(count3, 6);
}

#[tokio::test]
async fn test_inject_message_does_not_contact_llm() {
    let client = Arc::new(MockClient::new("Response".to_string()));
    let mut session = LLMSession::new(client.clone(), "System".to_string(), 10_000);

    session.inject_message(Role::Assistant, "seeded context".to_string());
    assert_eq!(session.get_conversation_history().len(), 1);
    assert_eq!(client.get_last_message_count().await, 0);
}

#[tokio::test]
async fn test_set_system_prompt_updates_text() {
    let client = Arc::new(MockClient::new("Response".to_string()));
    let mut session = LLMSession::new(client, "Original".to_string(), 10_000);
    assert_eq!(session.system_prompt_text(), "Original");

    session.set_system_prompt("Updated".to_string());
    assert_eq!(session.system_prompt_text(), "Updated");
}

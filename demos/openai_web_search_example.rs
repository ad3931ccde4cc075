//! OpenAI Function-Calling Example
//!
//! Demonstrates native function calling against an OpenAI-compatible
//! endpoint using the provider-agnostic [`ToolDefinition`] contract:
//! - Building a JSON-Schema tool definition by hand
//! - Passing it through `ClientWrapper::send_message`
//! - Reading back the model's native tool call, executing it locally, and
//!   feeding the result back in a follow-up turn
//! - Doing the same through the higher-level [`LLMSession`] API
//!
//! Run with:
//! ```bash
//! export OPEN_AI_SECRET=your_openai_key
//! cargo run --example openai_function_calling_example
//! ```

use ali_kernel::client_wrapper::{ClientWrapper, Message, Role, ToolDefinition};
use ali_kernel::clients::openai::{Model, OpenAIClient};
use ali_kernel::LLMSession;
use std::sync::Arc;

fn get_weather_tool() -> ToolDefinition {
    ToolDefinition {
        name: "get_current_weather".to_string(),
        description: "Get the current weather for a city".to_string(),
        parameters_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city to look up, e.g. 'San Francisco'"
                }
            },
            "required": ["city"]
        }),
    }
}

/// Pretend weather lookup — a real implementation would call a weather API.
fn run_weather_tool(city: &str) -> String {
    format!("{{\"city\": \"{city}\", \"condition\": \"sunny\", \"temp_f\": 68}}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("\n{}", "=".repeat(80));
    println!("  OpenAI Function-Calling Example");
    println!("{}\n", "=".repeat(80));

    let openai_key = std::env::var("OPEN_AI_SECRET").expect("OPEN_AI_SECRET must be set");
    let client = OpenAIClient::new_with_model_enum(&openai_key, Model::GPT4o);

    println!("✓ OpenAI client initialized");
    println!("✓ Model: {}\n", client.model_name());

    // Example 1: Direct ClientWrapper call with a native tool.
    println!("{}", "=".repeat(80));
    println!("Example 1: Direct tool call");
    println!("{}\n", "=".repeat(80));

    let messages = vec![
        Message {
            role: Role::System,
            content: Arc::from("You are a helpful assistant with access to weather lookups."),
            tool_calls: vec![],
        },
        Message {
            role: Role::User,
            content: Arc::from("What's the weather in Austin right now?"),
            tool_calls: vec![],
        },
    ];

    let tools = vec![get_weather_tool()];
    let response = client.send_message(&messages, Some(tools.clone())).await?;

    if let Some(call) = response.tool_calls.first() {
        println!("Model requested tool call: {} {:?}", call.name, call.arguments);
        let city = call
            .arguments
            .get("city")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let tool_output = run_weather_tool(city);

        let mut follow_up_messages = messages.clone();
        follow_up_messages.push(Message {
            role: Role::Assistant,
            content: response.content.clone(),
            tool_calls: response.tool_calls.clone(),
        });
        follow_up_messages.push(Message {
            role: Role::Tool { call_id: call.id.clone() },
            content: Arc::from(tool_output.as_str()),
            tool_calls: vec![],
        });

        let final_response = client.send_message(&follow_up_messages, Some(tools.clone())).await?;
        println!("Final answer: {}\n", final_response.content);
    } else {
        println!("Response:\n{}\n", response.content);
    }

    if let Some(usage) = client.get_last_usage().await {
        println!(
            "Tokens - Input: {}, Output: {}, Total: {}\n",
            usage.input_tokens, usage.output_tokens, usage.total_tokens
        );
    }

    // Example 2: Same tool through LLMSession's rolling history.
    println!("{}", "=".repeat(80));
    println!("Example 2: Tool call through LLMSession");
    println!("{}\n", "=".repeat(80));

    let session_client = Arc::new(OpenAIClient::new_with_model_enum(&openai_key, Model::GPT4o));
    let mut session = LLMSession::new(
        session_client,
        "You are a helpful assistant with access to weather lookups.".to_string(),
        8192,
    );

    let response = session
        .send_message(
            Role::User,
            "What's the weather like in Denver?".to_string(),
            Some(vec![get_weather_tool()]),
        )
        .await?;

    println!("Assistant: {}\n", response.content);

    println!("{}", "=".repeat(80));
    println!("Summary");
    println!("{}\n", "=".repeat(80));
    println!("✓ Native function calling round-trip completed");
    println!("✓ LLMSession tool-aware turn completed");

    Ok(())
}

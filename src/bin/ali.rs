//! Thin REPL stub over [`Orchestrator`].
//!
//! The real line-editor, TOML config loading, markdown rendering, theming,
//! and desktop notifications are external collaborators (see spec.md §1) and
//! are deliberately not implemented here. This binary exists only to show
//! the slash-command surface from spec.md §6 dispatching into the
//! orchestration runtime: a plain `stdin`/`stdout` loop, one `OpenAIClient`
//! agent named "ali" registered as the orchestrator, and a handful of
//! commands mapped onto [`Orchestrator`] methods.
use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use ali_kernel::clients::openai::{Model, OpenAIClient};
use ali_kernel::config::KernelConfig;
use ali_kernel::kernel::provider::ModelRegistry;
use ali_kernel::{Agent, AgentRegistry, AgentRole, ClientWrapper, Orchestrator};

const HELP: &str = "\
/help              list commands
/quit              flush state, shut down
/status            print orchestrator + cost status
/agents            list active agents
/cost [budget]     show or set the budget cap
/debug <level>     set log verbosity (none, error, warn, info, debug, trace)
anything else      sent to the orchestrator as a user turn";

#[tokio::main]
async fn main() {
    ali_kernel::init_logger();

    let secret_key = env::var("ALI_KERNEL_API_KEY")
        .or_else(|_| env::var("OPEN_AI_SECRET"))
        .expect("set ALI_KERNEL_API_KEY (or OPEN_AI_SECRET) with a provider credential");

    let registry = Arc::new(AgentRegistry::new());
    let ali_client: Arc<dyn ClientWrapper> = Arc::new(OpenAIClient::new_with_model_enum(&secret_key, Model::GPT4o));
    registry
        .register(
            Agent::new("ali", "Ali", ali_client).with_expertise("chief of staff: routes, plans, and converges"),
            AgentRole::Orchestrator,
        )
        .await;

    let router_client: Arc<dyn ClientWrapper> =
        Arc::new(OpenAIClient::new_with_model_enum(&secret_key, Model::GPT5Nano));
    let model_registry = Arc::new(ModelRegistry::with_known_models());

    let config = KernelConfig { budget_limit_usd: budget_from_env(), ..KernelConfig::default() };
    let orchestrator = match Orchestrator::init(&config, registry, model_registry, "ali", router_client) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("failed to start kernel: {e}");
            std::process::exit(1);
        }
    };

    println!("{HELP}\n");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(exit_code) = dispatch_command(line, &orchestrator).await {
            if let Err(e) = orchestrator.shutdown() {
                eprintln!("shutdown error: {e}");
            }
            std::process::exit(exit_code);
        }
    }

    let _ = orchestrator.shutdown();
}

/// Returns `Some(exit_code)` when the REPL should terminate.
async fn dispatch_command(line: &str, orchestrator: &Orchestrator) -> Option<i32> {
    match line {
        "/help" => {
            println!("{HELP}");
            None
        }
        "/quit" => Some(0),
        "/status" => {
            println!("{}", orchestrator.status().await);
            None
        }
        "/agents" => {
            let ids = orchestrator.registry().all_ids().await;
            println!("{}", ids.join(", "));
            None
        }
        _ if line.starts_with("/cost") => {
            let rest = line.trim_start_matches("/cost").trim();
            if let Ok(new_limit) = rest.parse::<f64>() {
                orchestrator.cost_controller().set_budget_limit(new_limit);
                orchestrator.cost_controller().clear_budget_exceeded();
            }
            println!(
                "budget_limit=${:.4} session_spend=${:.4}",
                orchestrator.cost_controller().budget_limit(),
                orchestrator.cost_controller().session_spend(),
            );
            None
        }
        _ if line.starts_with("/debug") => {
            let level = line.trim_start_matches("/debug").trim();
            ali_kernel::config::set_log_level(level);
            None
        }
        _ => {
            match orchestrator.process(line).await {
                Ok(reply) => println!("{reply}"),
                Err(e) => eprintln!("error: {e}"),
            }
            None
        }
    }
}

fn budget_from_env() -> f64 {
    env::var("ALI_KERNEL_BUDGET_USD").ok().and_then(|v| v.parse().ok()).unwrap_or(10.0)
}

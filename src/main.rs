use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use agent_switchboard::agent::{AgentDescriptor, AgentRegistry, ScriptedAgent, ScriptedTool};
use agent_switchboard::backend::{FnBackend, LegacyAgentAdapter, LegacyRequest};
use agent_switchboard::cli::{Console, ConsoleCommand, ConsoleRenderer};
use agent_switchboard::config::SwitchboardConfig;
use agent_switchboard::core::Capability;
use agent_switchboard::handler::InboundRequest;
use agent_switchboard::logging;
use agent_switchboard::routing::ForcedRoute;
use agent_switchboard::state::{MemoryQuery, PreferencesUpdate, StateContext};
use agent_switchboard::Switchboard;

/// Environment variable naming an optional JSON config file
const CONFIG_PATH_VAR: &str = "SWITCHBOARD_CONFIG";

const TOKEN_DELAY: Duration = Duration::from_millis(25);

fn load_config() -> anyhow::Result<SwitchboardConfig> {
    let config = match std::env::args().nth(1).or_else(|| std::env::var(CONFIG_PATH_VAR).ok()) {
        Some(path) => SwitchboardConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => SwitchboardConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn demo_registry(config: &SwitchboardConfig) -> anyhow::Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();

    registry.register(
        ScriptedAgent::new(
            AgentDescriptor::new("AnalyticalAgent", "analytical")
                .with_description("Numbers, trends and reports")
                .with_capability(Capability::Analytical)
                .with_keywords(["analyze", "analysis", "data", "statistics", "trend", "report"]),
            "Breaking \"{input}\" down: the figures point to a steady upward trend.",
        )
        .with_tool(ScriptedTool::ok(
            "query_metrics",
            json!({"range": "30d"}),
            json!({"rows": 30, "growth": "4.2%"}),
        ))
        .with_token_delay(TOKEN_DELAY),
    )?;

    registry.register(
        ScriptedAgent::new(
            AgentDescriptor::new("CreativeAgent", "creative")
                .with_description("Stories, names and copy")
                .with_capability(Capability::Creative)
                .with_keywords(["story", "poem", "write", "idea", "slogan"])
                .with_aliases(["writer"]),
            "Here is a first draft inspired by \"{input}\": once upon a time...",
        )
        .with_token_delay(TOKEN_DELAY),
    )?;

    registry.register(
        ScriptedAgent::new(
            AgentDescriptor::new("TechnicalAgent", "technical")
                .with_description("Code and debugging")
                .with_capability(Capability::Technical)
                .with_keywords(["code", "bug", "error", "compile", "rust", "deploy"]),
            "Start with the first error the compiler reports and work down.",
        )
        .with_tool(ScriptedTool::failing(
            "run_tests",
            json!({"target": "all"}),
            "2 tests failed",
        ))
        .with_token_delay(TOKEN_DELAY),
    )?;

    let support = FnBackend::new("SupportDesk", |request: &LegacyRequest| {
        Ok(format!(
            "Ticket opened for \"{}\". We have {} earlier messages on file for this session.",
            request.message,
            request.history.len()
        ))
    });
    registry.register(LegacyAgentAdapter::new(support).with_streaming(config.streaming.clone()))?;

    Ok(registry)
}

async fn run(switchboard: &Switchboard, session_id: &str, user_id: &str) -> anyhow::Result<()> {
    let console = Console::new();
    let renderer = ConsoleRenderer::new();
    let state = switchboard.state();
    let ctx = StateContext::new(user_id).creating();

    console.print_banner(session_id, user_id);

    while let Some(line) = console.read_input()? {
        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Exit => break,
            ConsoleCommand::Invalid(usage) => console.print_error(&usage),
            ConsoleCommand::Send {
                forced_agent,
                message,
            } => {
                let mut request = InboundRequest::new(session_id, user_id, message);
                if let Some(agent) = forced_agent {
                    request = request.with_forced_agent(ForcedRoute::agent_type(agent));
                }
                renderer.render(switchboard.handle(request)).await;
                console.print_separator();
            }
            ConsoleCommand::Lock(enabled) => {
                match state
                    .update_preferences(session_id, PreferencesUpdate::agent_lock(enabled), &ctx)
                    .await
                {
                    Ok(_) => console.print_system(&format!(
                        "Agent lock {}",
                        if enabled { "on" } else { "off" }
                    )),
                    Err(e) => console.print_error(&e.to_string()),
                }
            }
            ConsoleCommand::Share => {
                switchboard.queue().flush().await?;
                match state.share_session_memory(session_id, &ctx).await {
                    Ok(snapshot) => console.print_system(&format!(
                        "Shared {} messages across {} sessions",
                        snapshot.message_count(),
                        snapshot.sessions.len()
                    )),
                    Err(e) => console.print_error(&e.to_string()),
                }
            }
            ConsoleCommand::Memory(query) => {
                switchboard.queue().flush().await?;
                match state
                    .search_memories(&query, &MemoryQuery::for_user(user_id), &ctx)
                    .await
                {
                    Ok(hits) if hits.is_empty() => console.print_system("No matching memories"),
                    Ok(hits) => {
                        for hit in hits {
                            console.print_system(&format!(
                                "[{} {:.2}] {}: {}",
                                hit.session_id,
                                hit.score,
                                hit.role.as_str(),
                                hit.content
                            ));
                        }
                    }
                    Err(e) => console.print_error(&e.to_string()),
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let _log_guard = logging::init_logging(&config.logging)?;

    tracing::info!("=== Agent Switchboard Starting ===");

    let registry = demo_registry(&config)?;
    tracing::info!("Registered {} agents", registry.len());

    let switchboard = Switchboard::new(config, registry)?;

    let user_id = std::env::var("USER").unwrap_or_else(|_| "demo".to_string());
    let session_id = uuid::Uuid::new_v4().to_string();

    let result = run(&switchboard, &session_id, &user_id).await;
    switchboard.shutdown().await?;

    tracing::info!("=== Agent Switchboard Shutting Down ===");
    result
}

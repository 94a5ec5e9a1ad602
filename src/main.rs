// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use kit_core::{Kit, KitBuilder};
use kit_ext::ExtensionRuntime;
use kit_model::MockLanguageModel;
use kit_tools::EchoTool;
use kit_tree::TreeStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(cmd) = &cli.command {
        return match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                Ok(())
            }
            Commands::ShowConfig => {
                let config = kit_config::load(cli.config.as_deref())?;
                println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
                Ok(())
            }
            Commands::Sessions { limit } => print_sessions(*limit),
            Commands::Tree { path } => print_tree(path),
        };
    }

    let config = kit_config::load(cli.config.as_deref())?;
    let cwd = kit_runtime::find_project_root().unwrap_or_else(|_| PathBuf::from("."));

    let store = open_store(&cli, &cwd)?;
    let ext = ExtensionRuntime::discover(Some(&cwd));

    let model: Arc<dyn kit_model::LanguageModel> =
        Arc::new(MockLanguageModel::echo().with_context_window(config.model.context_window));

    let system_prompt = match &cli.system_prompt_file {
        Some(path) => Some(std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?),
        None => config.agent.system_prompt.clone(),
    };

    let mut builder = KitBuilder::new(model)
        .with_store(store)
        .with_extensions(ext)
        .with_tool(Arc::new(EchoTool))
        .with_max_steps(config.agent.max_steps)
        .with_reserve_tokens(config.agent.reserve_tokens)
        .with_keep_recent_tokens(config.agent.keep_recent_tokens);
    if let Some(prompt) = system_prompt {
        builder = builder.with_system_prompt(prompt);
    }
    let kit = builder.build();

    if cli.compact {
        if let Some(summary) = kit.compact(kit_core::CompactOptions { force: true, custom_instructions: None }).await? {
            tracing::info!(tokens_before = summary.tokens_before, tokens_after = summary.tokens_after, "compacted session");
        }
    }

    let prompt = cli.prompt.clone().unwrap_or_else(|| "Say hello.".to_string());
    let result = run_prompt(&kit, &prompt, cli.json).await;
    kit.close();
    result
}

async fn run_prompt(kit: &Kit, prompt: &str, json: bool) -> anyhow::Result<()> {
    let outcome = kit.prompt_result(prompt).await?;
    if json {
        let payload = serde_json::json!({
            "response": outcome.response,
            "input_tokens": outcome.total_usage.input_tokens,
            "output_tokens": outcome.total_usage.output_tokens,
            "message_count": outcome.messages.len(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("{}", outcome.response);
    }
    Ok(())
}

fn open_store(cli: &Cli, cwd: &std::path::Path) -> anyhow::Result<TreeStore> {
    if cli.in_memory {
        return Ok(TreeStore::in_memory(cwd));
    }
    match cli.resume.as_deref() {
        Some("") => Ok(TreeStore::continue_recent(cwd)?),
        Some(path) => Ok(TreeStore::open(path)?),
        None => Ok(TreeStore::create(cwd)?),
    }
}

fn print_sessions(limit: usize) -> anyhow::Result<()> {
    let cwd = kit_runtime::find_project_root().unwrap_or_else(|_| PathBuf::from("."));
    let dir = kit_tree::sessions_dir(&kit_tree::default_config_home(), &cwd);
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "jsonl").unwrap_or(false))
        .collect();
    entries.sort();
    entries.reverse();
    for path in entries.into_iter().take(limit) {
        println!("{}", path.display());
    }
    Ok(())
}

fn print_tree(path: &std::path::Path) -> anyhow::Result<()> {
    let store = TreeStore::open(path)?;
    for root in store.tree() {
        print_node(&root, 0);
    }
    Ok(())
}

fn print_node(node: &kit_tree::TreeNode, depth: usize) {
    let indent = " ".repeat(depth);
    let label = match &node.entry.kind {
        kit_tree::EntryKind::Message { role, .. } => format!("message({role:?})"),
        kit_tree::EntryKind::ModelChange { provider, model_id } => format!("model_change({provider}/{model_id})"),
        kit_tree::EntryKind::BranchSummary { .. } => "branch_summary".to_string(),
        kit_tree::EntryKind::Label { label, .. } => format!("label({label})"),
        kit_tree::EntryKind::SessionInfo { name } => format!("session_info({name})"),
    };
    println!("{indent}{} {label}", &node.entry.id[..node.entry.id.len().min(8)]);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

#[derive(Parser, Debug)]
#[command(
        name = "kit",
        about = "A bounded tool-calling agent loop over a tree-structured session store",
        version,
        long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Prompt text for a single headless turn. Omit to start an empty session.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Resume a saved conversation.
    ///
    /// Supply a path to a session's `.jsonl` journal. Omit the path to
    /// continue the most recently modified session rooted at the current
    /// directory. Implies the session is appended to rather than created.
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = "")]
    pub resume: Option<String>,

    /// Run without touching disk: the session exists only for this process.
    #[arg(long)]
    pub in_memory: bool,

    /// Path to the config file (overrides auto-discovery, ).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Override the system prompt by reading from a file.
    #[arg(long, value_name = "PATH")]
    pub system_prompt_file: Option<PathBuf>,

    /// Ask the model to compact the session before replying to this prompt.
    #[arg(long)]
    pub compact: bool,

    /// Print the final assistant message as JSON (response, usage, message count).
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit.
    ShowConfig,
    /// List saved sessions for the current directory.
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },
    /// Print the tree of every entry in a session journal.
    Tree {
        /// Path to the session's `.jsonl` journal.
        path: PathBuf,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kit", &mut std::io::stdout());
}

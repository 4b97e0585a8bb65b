use clap::{Parser, Subcommand};
use mind_core::OutputFormat;

#[derive(Parser)]
#[command(name = "mind")]
#[command(about = "Persistent memory for coding-agent sessions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle a host hook event; reads the event JSON from stdin
    Hook {
        #[command(subcommand)]
        event: HookEvent,
    },

    /// Search remembered observations
    Search {
        /// Words to look for
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = mind_memory::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Ask a question answered from memory
    Ask {
        question: String,
    },

    /// Show the context bundle injected at session start
    Context {
        /// Also include memories matching this query
        query: Option<String>,
    },

    /// Show memory file statistics
    Stats,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// Inject recent memories into a new session
    SessionStart,
    /// Capture the output of a completed tool call
    PostToolUse,
    /// Save a summary of the ending session
    Stop,
}

impl HookEvent {
    pub fn host_name(self) -> &'static str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
        }
    }
}

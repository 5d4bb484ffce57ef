//! CLI definitions for flowhands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// flowhands CLI.
#[derive(Parser)]
#[command(name = "flowhands")]
#[command(about = "Browser automation core for Flow video generation")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/flowhands.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Attach to the tool tab and serve the command API (default)
    Serve {
        /// Server host (overrides `server.host`)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides `server.port`)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one generation in the tool tab and print the reply
    Generate {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Generation mode label, e.g. "Frames to Video"
        #[arg(long)]
        mode: Option<String>,

        /// Start in a fresh project
        #[arg(long)]
        new_project: bool,

        /// Reference frame image, in slot order (repeatable)
        #[arg(long = "frame", value_name = "PATH")]
        frames: Vec<PathBuf>,

        /// Skip the page controls and call the generation API directly
        #[arg(long)]
        direct: bool,
    },

    /// Apply settings (and optionally a prompt) without generating
    TestSettings {
        #[command(flatten)]
        settings: SettingsArgs,

        /// Prompt text to fill in
        #[arg(short, long)]
        prompt: Option<String>,

        /// Start in a fresh project
        #[arg(long)]
        new_project: bool,
    },

    /// Validate the configuration file and exit
    CheckConfig,
}

#[derive(Args, Clone, Default)]
pub(crate) struct SettingsArgs {
    /// Aspect ratio: landscape, portrait, 16:9 or 9:16
    #[arg(short, long)]
    pub aspect: Option<String>,

    /// Model label, e.g. "Veo 3.1 - Fast"
    #[arg(short, long)]
    pub model: Option<String>,

    /// Outputs per prompt (1-4)
    #[arg(short, long)]
    pub outputs: Option<u32>,
}

//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Drive an environment hosted by a gymlink server
#[derive(Parser, Debug)]
#[command(name = "gymlink")]
#[command(about = "Command-line client for remote gymlink environments")]
#[command(version)]
pub struct Cli {
    /// Server address (tcp://host:port, unix:///path, host:port, or a
    /// remote alias from the config file)
    #[arg(long, env = "GYMLINK_ADDR")]
    pub addr: Option<String>,

    /// Environment to create, e.g. CartPole-v0
    #[arg(short = 'e', long, env = "GYMLINK_ENV")]
    pub env: Option<String>,

    /// Also log to a file (default: gymlink.log in the state log directory)
    #[arg(long, value_name = "PATH", num_args = 0..=1, require_equals = true)]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the action and observation spaces as JSON
    Spaces,

    /// Print randomly sampled actions
    Sample {
        /// Number of actions to sample
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Run a random agent and report the reward of each episode
    Rollout {
        #[arg(long, default_value_t = 1)]
        episodes: usize,

        /// Step limit per episode
        #[arg(long, default_value_t = 1000)]
        max_steps: usize,

        /// Render every step
        #[arg(long)]
        render: bool,

        /// Record episodes into this directory
        #[arg(long)]
        monitor: Option<PathBuf>,

        /// Clear existing monitor files
        #[arg(long, requires = "monitor")]
        force: bool,

        /// Keep existing monitor files
        #[arg(long, requires = "monitor")]
        resume: bool,

        /// Record video
        #[arg(long, requires = "monitor")]
        video: bool,
    },
}
